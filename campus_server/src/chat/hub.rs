//! In-process presence tracking and per-user fan-out.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use campus_core::{entity::prelude::Presence, ids::UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::debug;

use super::events::ServerEvent;

pub type ConnectionId = u64;
pub type Outbound = UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub status: Presence,
    pub last_seen: DateTime<Utc>,
    /// Whose chat the user has open.
    #[serde(rename = "for")]
    pub for_user: Option<UserId>,
}

/// Who is announced to other users when a chat opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatProfile {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

impl PresenceRecord {
    fn now(status: Presence, for_user: Option<UserId>) -> Self {
        Self {
            status,
            last_seen: Utc::now(),
            for_user,
        }
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<UserId, HashMap<ConnectionId, Outbound>>,
    statuses: HashMap<UserId, PresenceRecord>,
    active: HashSet<UserId>,
    online: HashSet<UserId>,
    next_id: ConnectionId,
}

impl HubState {
    fn send_to_user(&self, user: UserId, event: &ServerEvent) -> bool {
        let mut delivered = false;
        if let Some(conns) = self.connections.get(&user) {
            for tx in conns.values() {
                delivered |= tx.send(event.clone()).is_ok();
            }
        }
        delivered
    }

    fn broadcast_except(&self, skip: Option<ConnectionId>, event: &ServerEvent) {
        for conns in self.connections.values() {
            for (id, tx) in conns {
                if Some(*id) != skip {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    fn online_users(&self) -> ServerEvent {
        ServerEvent::new("get_online_users", &self.statuses)
    }

    fn set_status(&mut self, user: UserId, status: Presence, for_user: Option<UserId>) {
        self.statuses
            .insert(user, PresenceRecord::now(status, for_user));
    }
}

/// Connection registry plus the presence map. Never awaits while locked.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubState>>,
}

impl Hub {
    /// Registers a connection, marks the user active and broadcasts the status map.
    pub async fn connect(&self, user: UserId, tx: Outbound) -> ConnectionId {
        let mut state = self.inner.lock().await;
        state.next_id += 1;
        let id = state.next_id;

        state.connections.entry(user).or_default().insert(id, tx);
        state.active.insert(user);
        // A second tab must not knock an open chat back to active.
        if !state.online.contains(&user) {
            state.set_status(user, Presence::Active, None);
        }

        let snapshot = state.online_users();
        state.broadcast_except(None, &snapshot);
        debug!(%user, connection = id, "connection registered");
        id
    }

    pub async fn join_chat(&self, profile: &ChatProfile, conn: ConnectionId, friend: Option<UserId>) {
        let user = profile.user_id;
        let mut state = self.inner.lock().await;
        state.online.insert(user);
        state.set_status(user, Presence::Online, friend);

        let snapshot = state.online_users();
        state.broadcast_except(None, &snapshot);
        let change = ServerEvent::new(
            "online_user",
            &json!({
                "user_id": user,
                "user_name": profile.name,
                "user_avatar": profile.avatar,
                "timestamp": Utc::now(),
                "status": Presence::Online,
            }),
        );
        state.broadcast_except(Some(conn), &change);
    }

    pub async fn leave_chat(&self, user: UserId, conn: ConnectionId) {
        let mut state = self.inner.lock().await;
        state.online.remove(&user);
        state.set_status(user, Presence::Active, None);

        let snapshot = state.online_users();
        state.broadcast_except(None, &snapshot);
        let change = ServerEvent::new(
            "online_user",
            &json!({
                "user_id": user,
                "timestamp": Utc::now(),
                "status": Presence::Offline,
            }),
        );
        state.broadcast_except(Some(conn), &change);
    }

    /// Drops a connection. Returns true when it was the user's last one.
    pub async fn disconnect(&self, user: UserId, conn: ConnectionId) -> bool {
        let mut state = self.inner.lock().await;
        let last = match state.connections.get_mut(&user) {
            Some(conns) => {
                conns.remove(&conn);
                conns.is_empty()
            }
            None => true,
        };
        if !last {
            return false;
        }

        state.connections.remove(&user);
        state.active.remove(&user);
        state.online.remove(&user);
        state.set_status(user, Presence::Offline, None);

        let snapshot = state.online_users();
        state.broadcast_except(None, &snapshot);
        debug!(%user, "last connection closed");
        true
    }

    /// Queues an event on every connection of `user`. Returns false if none took it.
    pub async fn send_to_user(&self, user: UserId, event: ServerEvent) -> bool {
        self.inner.lock().await.send_to_user(user, &event)
    }

    pub async fn send_to_users(&self, users: &[UserId], event: ServerEvent) {
        let state = self.inner.lock().await;
        for user in users {
            state.send_to_user(*user, &event);
        }
    }

    pub async fn send_to_connection(&self, user: UserId, conn: ConnectionId, event: ServerEvent) -> bool {
        let state = self.inner.lock().await;
        state
            .connections
            .get(&user)
            .and_then(|conns| conns.get(&conn))
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// True while the user has a chat window open.
    pub async fn is_online(&self, user: UserId) -> bool {
        self.inner.lock().await.online.contains(&user)
    }

    pub async fn is_connected(&self, user: UserId) -> bool {
        self.inner.lock().await.active.contains(&user)
    }

    pub async fn status(&self, user: UserId) -> Option<PresenceRecord> {
        self.inner.lock().await.statuses.get(&user).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<UserId, PresenceRecord> {
        self.inner.lock().await.statuses.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn profile(user_id: UserId, name: &str) -> ChatProfile {
        ChatProfile {
            user_id,
            name: name.to_string(),
            avatar: None,
        }
    }

    fn names(events: &[ServerEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.event).collect()
    }

    #[tokio::test]
    async fn test_presence_transitions() {
        let hub = Hub::default();
        let asha = UserId::new();
        let ravi = UserId::new();
        let (tx, mut rx) = unbounded_channel();

        let conn = hub.connect(asha, tx).await;
        assert_eq!(hub.status(asha).await.unwrap().status, Presence::Active);
        assert!(hub.is_connected(asha).await);
        assert!(!hub.is_online(asha).await);

        hub.join_chat(&profile(asha, "Asha"), conn, Some(ravi)).await;
        let record = hub.status(asha).await.unwrap();
        assert_eq!(record.status, Presence::Online);
        assert_eq!(record.for_user, Some(ravi));
        assert!(hub.is_online(asha).await);

        hub.leave_chat(asha, conn).await;
        assert_eq!(hub.status(asha).await.unwrap().status, Presence::Active);
        assert!(!hub.is_online(asha).await);

        assert!(hub.disconnect(asha, conn).await);
        assert_eq!(hub.status(asha).await.unwrap().status, Presence::Offline);
        assert!(!hub.is_connected(asha).await);

        // The connection's own broadcasts, never the online_user echo.
        let seen = drain(&mut rx);
        assert_eq!(
            names(&seen),
            vec!["get_online_users", "get_online_users", "get_online_users"]
        );
    }

    #[tokio::test]
    async fn test_online_user_goes_to_others_only() {
        let hub = Hub::default();
        let asha = UserId::new();
        let ravi = UserId::new();
        let (asha_tx, mut asha_rx) = unbounded_channel();
        let (ravi_tx, mut ravi_rx) = unbounded_channel();

        let asha_conn = hub.connect(asha, asha_tx).await;
        hub.connect(ravi, ravi_tx).await;
        drain(&mut asha_rx);
        drain(&mut ravi_rx);

        let asha_profile = ChatProfile {
            user_id: asha,
            name: "Asha".to_string(),
            avatar: Some("https://cdn.example.com/asha.png".to_string()),
        };
        hub.join_chat(&asha_profile, asha_conn, None).await;
        assert_eq!(names(&drain(&mut asha_rx)), vec!["get_online_users"]);

        let ravi_events = drain(&mut ravi_rx);
        assert_eq!(names(&ravi_events), vec!["get_online_users", "online_user"]);
        let joined = &ravi_events[1].data;
        assert_eq!(joined["status"], "online");
        assert_eq!(joined["user_id"], asha.to_string());
        assert_eq!(joined["user_name"], "Asha");
        assert_eq!(joined["user_avatar"], "https://cdn.example.com/asha.png");
        assert!(joined["timestamp"].is_string());

        hub.leave_chat(asha, asha_conn).await;
        assert_eq!(names(&drain(&mut asha_rx)), vec!["get_online_users"]);
        let ravi_events = drain(&mut ravi_rx);
        assert_eq!(names(&ravi_events), vec!["get_online_users", "online_user"]);
        let left = &ravi_events[1].data;
        assert_eq!(left["status"], "offline");
        assert_eq!(left["user_id"], asha.to_string());
        assert!(left["timestamp"].is_string());
        assert!(left.get("user_name").is_none());
    }

    #[tokio::test]
    async fn test_last_connection_decides_offline() {
        let hub = Hub::default();
        let asha = UserId::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();

        let first = hub.connect(asha, tx1).await;
        let second = hub.connect(asha, tx2).await;
        assert_ne!(first, second);

        assert!(!hub.disconnect(asha, first).await);
        assert_eq!(hub.status(asha).await.unwrap().status, Presence::Active);

        drain(&mut rx2);
        assert!(hub.send_to_user(asha, ServerEvent::new("ping", &json!({}))).await);
        assert_eq!(names(&drain(&mut rx2)), vec!["ping"]);

        assert!(hub.disconnect(asha, second).await);
        assert!(!hub.send_to_user(asha, ServerEvent::new("ping", &json!({}))).await);
    }

    #[tokio::test]
    async fn test_snapshot_serializes_with_user_keys() {
        let hub = Hub::default();
        let asha = UserId::new();
        let (tx, _rx) = unbounded_channel();
        hub.connect(asha, tx).await;

        let wire = serde_json::to_value(hub.snapshot().await).unwrap();
        assert_eq!(wire[asha.to_string()]["status"], "active");
        assert!(wire[asha.to_string()]["for"].is_null());
    }
}
