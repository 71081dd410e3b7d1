use campus_core::{
    auth::Identity,
    entity::prelude::MessageModel,
    ids::{MessageId, UserId},
    service::{
        messages::{MessageView, NewChannelMessage, NewDirectMessage},
        notifications::MessageNotice,
    },
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    events::{
        DeleteMessage, DirectMessage, Frame, GroupMessage, JoinChat, MarkNotificationsRead,
        ReadMessages, ServerEvent, Typing,
    },
    hub::{ChatProfile, ConnectionId},
};
use crate::{error::ApiError, state::AppState};

#[derive(Serialize)]
struct Outgoing<'a> {
    #[serde(flatten)]
    view: &'a MessageView,
    sender_name: &'a str,
    is_own_message: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_id: Option<&'a Value>,
}

/// Pushes a stored direct message to its recipient, raising a notification
/// first when the recipient has no chat window open.
pub async fn deliver_direct(state: &AppState, sender: &Identity, view: &MessageView) -> Result<(), ApiError> {
    let Some(recipient) = view.message.recipient_id else {
        return Ok(());
    };

    if !state.hub.is_online(recipient).await {
        let (notification, created) = state
            .core
            .notifications
            .notify_message(MessageNotice {
                recipient_id: recipient,
                sender_id: sender.user_id,
                sender_name: &sender.name,
                message_id: view.message.id,
                content: &view.message.content,
            })
            .await?;
        if created {
            let count = state.core.notifications.unread_count(recipient).await?;
            state
                .hub
                .send_to_user(
                    recipient,
                    ServerEvent::new(
                        "new_notification",
                        &json!({ "count": count, "notification": notification }),
                    ),
                )
                .await;
        }
    }

    let event = ServerEvent::new(
        "message",
        &Outgoing {
            view,
            sender_name: &sender.name,
            is_own_message: false,
            temp_id: None,
        },
    );
    state.hub.send_to_user(recipient, event).await;
    Ok(())
}

/// Tells each original sender that `reader` has read their messages.
pub async fn announce_reads(state: &AppState, reader: &Identity, read: &[MessageModel]) {
    for message in read {
        let event = ServerEvent::new(
            "read",
            &json!({
                "message_id": message.id,
                "read_by": reader.user_id,
                "read_by_name": reader.name,
                "read_at": message.read_at,
            }),
        );
        state.hub.send_to_user(message.sender_id, event).await;
    }
}

/// Tells the other side of a deleted message. Returns who was told.
pub async fn announce_delete(
    state: &AppState,
    deleted_by: UserId,
    message: &MessageModel,
) -> Result<Vec<UserId>, ApiError> {
    let targets = match (message.recipient_id, message.channel_id) {
        (Some(recipient), _) => vec![recipient],
        (None, Some(channel)) => state
            .core
            .channels
            .member_ids(channel)
            .await?
            .into_iter()
            .filter(|id| *id != deleted_by)
            .collect(),
        (None, None) => Vec::new(),
    };

    let event = ServerEvent::new(
        "delete",
        &json!({
            "message_id": message.id,
            "deleted_by": deleted_by,
            "deleted_at": Utc::now(),
        }),
    );
    state.hub.send_to_users(&targets, event).await;
    Ok(targets)
}

/// One websocket connection's view of the chat.
pub struct ChatSession {
    state: AppState,
    identity: Identity,
    conn: ConnectionId,
}

impl ChatSession {
    pub fn new(state: AppState, identity: Identity, conn: ConnectionId) -> Self {
        Self {
            state,
            identity,
            conn,
        }
    }

    fn user(&self) -> UserId {
        self.identity.user_id
    }

    /// Name from the session, avatar from the current user row.
    async fn profile(&self) -> ChatProfile {
        let avatar = match self.state.core.users.get_user(self.user()).await {
            Ok(user) => user.profile_picture,
            Err(e) => {
                warn!(user = %self.user(), error = %e, "avatar lookup failed");
                None
            }
        };
        ChatProfile {
            user_id: self.user(),
            name: self.identity.name.clone(),
            avatar,
        }
    }

    async fn reply(&self, event: &'static str, data: &impl Serialize) {
        self.state
            .hub
            .send_to_connection(self.user(), self.conn, ServerEvent::new(event, data))
            .await;
    }

    async fn fail(&self, event: &str, err: ApiError, temp_id: Option<Value>) {
        debug!(user = %self.user(), event, error = %err, "chat event rejected");
        let mut body = json!({ "event": event, "message": err.message });
        if let Some(temp_id) = temp_id {
            body["temp_id"] = temp_id;
        }
        self.reply("error", &body).await;
    }

    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => self.dispatch(frame).await,
            Err(e) => {
                self.fail("unknown", ApiError::bad_request(format!("malformed frame: {e}")), None)
                    .await
            }
        }
    }

    pub async fn dispatch(&self, frame: Frame) {
        let temp_id = frame
            .data
            .get("temp_id")
            .cloned()
            .filter(|v| !v.is_null());

        let result = match frame.event.as_str() {
            "join_chat" => match frame.payload::<JoinChat>() {
                Ok(p) => {
                    let profile = self.profile().await;
                    self.state.hub.join_chat(&profile, self.conn, p.friend_id).await;
                    Ok(())
                }
                Err(e) => Err(bad_payload(e)),
            },
            "leave_chat" => {
                self.state.hub.leave_chat(self.user(), self.conn).await;
                Ok(())
            }
            "typing" => match frame.payload::<Typing>() {
                Ok(p) => {
                    self.on_typing(p).await;
                    Ok(())
                }
                Err(e) => Err(bad_payload(e)),
            },
            "message" => match frame.payload::<DirectMessage>() {
                Ok(p) => self.on_message(p).await,
                Err(e) => Err(bad_payload(e)),
            },
            "group_message" => match frame.payload::<GroupMessage>() {
                Ok(p) => self.on_group_message(p).await,
                Err(e) => Err(bad_payload(e)),
            },
            "read" => match frame.payload::<ReadMessages>() {
                Ok(p) => self.on_read(p.message_ids).await,
                Err(e) => Err(bad_payload(e)),
            },
            "delete" => match frame.payload::<DeleteMessage>() {
                Ok(p) => self.on_delete(p.message_id).await,
                Err(e) => Err(bad_payload(e)),
            },
            "get_notifications" => self.on_get_notifications().await,
            "mark_notifications_read" => match frame.payload::<MarkNotificationsRead>() {
                Ok(p) => self.on_mark_notifications_read(p).await,
                Err(e) => Err(bad_payload(e)),
            },
            other => Err(ApiError::bad_request(format!("unknown event {other}"))),
        };

        if let Err(err) = result {
            self.fail(&frame.event, err, temp_id).await;
        }
    }

    async fn on_typing(&self, typing: Typing) {
        let Some(recipient) = typing.recipient_id else {
            return;
        };
        let event = ServerEvent::new(
            "typing",
            &json!({
                "user_id": self.user(),
                "user_name": self.identity.name,
                "status": typing.status,
                "timestamp": Utc::now(),
            }),
        );
        self.state.hub.send_to_user(recipient, event).await;
    }

    async fn on_message(&self, msg: DirectMessage) -> Result<(), ApiError> {
        let core = &self.state.core;
        core.attachments.check_owned(self.user(), &msg.attachments).await?;
        let view = core
            .messages
            .send_direct(
                self.user(),
                NewDirectMessage {
                    recipient_id: msg.recipient_id,
                    content: msg.content,
                    attachments: msg.attachments,
                },
            )
            .await?;

        if let Err(err) = deliver_direct(&self.state, &self.identity, &view).await {
            warn!(message = %view.message.id, error = %err, "message stored but not delivered");
        }
        self.confirm(&view, msg.temp_id.as_ref()).await;
        Ok(())
    }

    async fn on_group_message(&self, msg: GroupMessage) -> Result<(), ApiError> {
        let core = &self.state.core;
        core.attachments.check_owned(self.user(), &msg.attachments).await?;
        let delivery = core
            .messages
            .send_to_channel(
                self.user(),
                NewChannelMessage {
                    channel_id: msg.channel_id,
                    content: msg.content,
                    attachments: msg.attachments,
                },
            )
            .await?;

        let event = ServerEvent::new(
            "message",
            &Outgoing {
                view: &delivery.view,
                sender_name: &self.identity.name,
                is_own_message: false,
                temp_id: None,
            },
        );
        self.state.hub.send_to_users(&delivery.recipients, event).await;
        self.confirm(&delivery.view, msg.temp_id.as_ref()).await;
        Ok(())
    }

    async fn confirm(&self, view: &MessageView, temp_id: Option<&Value>) {
        self.reply(
            "message",
            &Outgoing {
                view,
                sender_name: &self.identity.name,
                is_own_message: true,
                temp_id,
            },
        )
        .await;
    }

    async fn on_read(&self, ids: Vec<MessageId>) -> Result<(), ApiError> {
        let core = &self.state.core;
        let read = core.messages.mark_read(self.user(), &ids).await?;
        core.notifications
            .mark_read_for_messages(self.user(), &ids)
            .await?;

        announce_reads(&self.state, &self.identity, &read).await;
        let confirmed: Vec<MessageId> = read.iter().map(|m| m.id).collect();
        self.reply("read", &json!({ "message_ids": confirmed, "confirmed": true }))
            .await;
        Ok(())
    }

    async fn on_delete(&self, message_id: MessageId) -> Result<(), ApiError> {
        let message = self
            .state
            .core
            .messages
            .delete_message(self.user(), message_id)
            .await?;
        announce_delete(&self.state, self.user(), &message).await?;
        self.reply(
            "delete",
            &json!({
                "message_id": message.id,
                "deleted_by": self.user(),
                "deleted_at": Utc::now(),
                "confirmed": true,
            }),
        )
        .await;
        Ok(())
    }

    async fn on_get_notifications(&self) -> Result<(), ApiError> {
        let notifications = &self.state.core.notifications;
        let unread = notifications.list_unread(self.user()).await?;
        let count = notifications.unread_count(self.user()).await?;
        self.reply(
            "notifications",
            &json!({ "notifications": unread, "count": count }),
        )
        .await;
        Ok(())
    }

    async fn on_mark_notifications_read(&self, mark: MarkNotificationsRead) -> Result<(), ApiError> {
        self.state
            .core
            .notifications
            .mark_many_read(self.user(), &mark.notification_ids)
            .await?;
        self.reply(
            "notifications_marked_read",
            &json!({ "notification_ids": mark.notification_ids, "confirmed": true }),
        )
        .await;
        Ok(())
    }
}

fn bad_payload(e: serde_json::Error) -> ApiError {
    ApiError::bad_request(format!("invalid payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use campus_core::service::accounts::Signup;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    async fn member(state: &AppState, name: &str) -> Identity {
        state
            .core
            .accounts
            .signup(Signup {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password: "secret123".to_string(),
                gender: None,
            })
            .await
            .unwrap()
            .identity
    }

    async fn connect(state: &AppState, identity: &Identity) -> (ChatSession, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        let conn = state.hub.connect(identity.user_id, tx).await;
        (ChatSession::new(state.clone(), identity.clone(), conn), rx)
    }

    /// Everything queued so far, minus presence broadcasts.
    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.event != "get_online_users" && event.event != "online_user" {
                events.push(event);
            }
        }
        events
    }

    fn frame(event: &str, data: Value) -> Frame {
        serde_json::from_value(json!({ "event": event, "data": data })).unwrap()
    }

    #[tokio::test]
    async fn test_message_to_idle_recipient_raises_notification() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, mut asha_rx) = connect(&state, &asha).await;
        let (_ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        asha_session
            .dispatch(frame(
                "message",
                json!({ "recipient_id": ravi.user_id, "content": "hello", "temp_id": "t1" }),
            ))
            .await;

        let to_ravi = drain(&mut ravi_rx);
        assert_eq!(to_ravi.len(), 2);
        assert_eq!(to_ravi[0].event, "new_notification");
        assert_eq!(to_ravi[0].data["count"], 1);
        assert_eq!(to_ravi[1].event, "message");
        assert_eq!(to_ravi[1].data["is_own_message"], false);
        assert!(to_ravi[1].data.get("temp_id").is_none());

        let to_asha = drain(&mut asha_rx);
        assert_eq!(to_asha.len(), 1);
        assert_eq!(to_asha[0].data["is_own_message"], true);
        assert_eq!(to_asha[0].data["temp_id"], "t1");
        assert_eq!(to_asha[0].data["content"], "hello");
    }

    #[tokio::test]
    async fn test_open_chat_skips_notification() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, _asha_rx) = connect(&state, &asha).await;
        let (ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        ravi_session
            .dispatch(frame("join_chat", json!({ "friendId": asha.user_id })))
            .await;
        let record = state.hub.status(ravi.user_id).await.unwrap();
        assert_eq!(record.for_user, Some(asha.user_id));
        asha_session
            .dispatch(frame("message", json!({ "recipient_id": ravi.user_id, "content": "hi" })))
            .await;

        let to_ravi = drain(&mut ravi_rx);
        assert_eq!(to_ravi.len(), 1);
        assert_eq!(to_ravi[0].event, "message");
        assert_eq!(state.core.notifications.unread_count(ravi.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_receipts_reach_the_sender() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, mut asha_rx) = connect(&state, &asha).await;
        let (ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        asha_session
            .dispatch(frame("message", json!({ "recipient_id": ravi.user_id, "content": "hi" })))
            .await;
        let message_id = drain(&mut asha_rx)[0].data["id"].clone();
        drain(&mut ravi_rx);

        ravi_session
            .dispatch(frame("read", json!({ "message_ids": [message_id] })))
            .await;

        let to_asha = drain(&mut asha_rx);
        assert_eq!(to_asha.len(), 1);
        assert_eq!(to_asha[0].event, "read");
        assert_eq!(to_asha[0].data["message_id"], message_id);
        assert_eq!(to_asha[0].data["read_by_name"], "Ravi");

        let to_ravi = drain(&mut ravi_rx);
        assert_eq!(to_ravi[0].data["confirmed"], true);
        assert_eq!(to_ravi[0].data["message_ids"], json!([message_id]));
        assert_eq!(state.core.notifications.unread_count(ravi.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_only_sender_may_delete() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, mut asha_rx) = connect(&state, &asha).await;
        let (ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        asha_session
            .dispatch(frame("message", json!({ "recipient_id": ravi.user_id, "content": "oops" })))
            .await;
        let message_id = drain(&mut asha_rx)[0].data["id"].clone();
        drain(&mut ravi_rx);

        ravi_session
            .dispatch(frame("delete", json!({ "message_id": message_id })))
            .await;
        let errors = drain(&mut ravi_rx);
        assert_eq!(errors[0].event, "error");
        assert_eq!(errors[0].data["event"], "delete");

        asha_session
            .dispatch(frame("delete", json!({ "message_id": message_id })))
            .await;
        assert_eq!(drain(&mut ravi_rx)[0].event, "delete");
        assert_eq!(drain(&mut asha_rx)[0].data["confirmed"], true);
    }

    #[tokio::test]
    async fn test_group_message_fans_out_to_members() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let kiran = member(&state, "Kiran").await;
        let channel = state
            .core
            .channels
            .create_channel(
                asha.user_id,
                campus_core::service::channels::NewChannel {
                    name: "study group".to_string(),
                    description: None,
                    members: vec![ravi.user_id],
                },
            )
            .await
            .unwrap();

        let (asha_session, mut asha_rx) = connect(&state, &asha).await;
        let (_ravi_session, mut ravi_rx) = connect(&state, &ravi).await;
        let (kiran_session, mut kiran_rx) = connect(&state, &kiran).await;

        asha_session
            .dispatch(frame(
                "group_message",
                json!({ "channel_id": channel.id, "content": "notes are up", "temp_id": 7 }),
            ))
            .await;
        assert_eq!(drain(&mut ravi_rx)[0].data["channel_id"], json!(channel.id));
        assert_eq!(drain(&mut asha_rx)[0].data["temp_id"], 7);
        assert!(drain(&mut kiran_rx).is_empty());

        kiran_session
            .dispatch(frame(
                "group_message",
                json!({ "channel_id": channel.id, "content": "let me in" }),
            ))
            .await;
        assert_eq!(drain(&mut kiran_rx)[0].event, "error");
    }

    #[tokio::test]
    async fn test_notification_events() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, _asha_rx) = connect(&state, &asha).await;
        let (ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        asha_session
            .dispatch(frame("message", json!({ "recipient_id": ravi.user_id, "content": "one" })))
            .await;
        drain(&mut ravi_rx);

        ravi_session.dispatch(frame("get_notifications", Value::Null)).await;
        let listed = drain(&mut ravi_rx);
        assert_eq!(listed[0].event, "notifications");
        assert_eq!(listed[0].data["count"], 1);
        let id = listed[0].data["notifications"][0]["id"].clone();

        ravi_session
            .dispatch(frame("mark_notifications_read", json!({ "notification_ids": [id] })))
            .await;
        assert_eq!(drain(&mut ravi_rx)[0].event, "notifications_marked_read");
        assert_eq!(state.core.notifications.unread_count(ravi.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_typing_status_is_relayed_as_sent() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let ravi = member(&state, "Ravi").await;
        let (asha_session, mut asha_rx) = connect(&state, &asha).await;
        let (_ravi_session, mut ravi_rx) = connect(&state, &ravi).await;

        for status in ["start", "stop"] {
            asha_session
                .dispatch(frame(
                    "typing",
                    json!({
                        "sender_id": asha.user_id,
                        "recipient_id": ravi.user_id,
                        "status": status
                    }),
                ))
                .await;
        }

        let to_ravi = drain(&mut ravi_rx);
        assert_eq!(to_ravi.len(), 2);
        assert_eq!(to_ravi[0].event, "typing");
        assert_eq!(to_ravi[0].data["status"], "start");
        assert_eq!(to_ravi[0].data["user_name"], "Asha");
        assert_eq!(to_ravi[1].data["status"], "stop");
        assert!(drain(&mut asha_rx).is_empty());
    }

    #[tokio::test]
    async fn test_bad_frames_report_errors() {
        let state = test_support::state().await;
        let asha = member(&state, "Asha").await;
        let (session, mut rx) = connect(&state, &asha).await;

        session.handle_text("not json").await;
        session.dispatch(frame("dance", json!({}))).await;
        session
            .dispatch(frame("typing", json!({ "status": true })))
            .await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event == "error"));
        assert_eq!(events[1].data["event"], "dance");
    }
}
