use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{FriendshipId, NotificationId, UserId},
};

#[derive(Debug, Error)]
pub enum FriendshipsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("friendship not found")]
    FriendshipNotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("you cannot send a friend request to yourself")]
    SelfRequest,

    #[error("friend request already exists")]
    AlreadyRequested,

    #[error("friend request is no longer pending")]
    NotPending,

    #[error("not allowed to change this friendship")]
    Forbidden,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FriendRequest {
    pub recipient_id: UserId,
}

/// A state change plus the notification raised for the other side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendshipChange {
    pub friendship: FriendshipModel,
    pub notification: NotificationModel,
}

/// A friendship seen from one side, with the other user attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendView {
    #[serde(flatten)]
    pub friendship: FriendshipModel,
    pub friend: Option<UserModel>,
}

async fn notify<C: ConnectionTrait>(
    conn: &C,
    user_id: UserId,
    kind: NotificationKind,
    sender: &UserModel,
    friendship_id: FriendshipId,
    body: String,
) -> Result<NotificationModel, DbErr> {
    let title = match kind {
        NotificationKind::FriendAccepted => "Friend request accepted",
        _ => "New friend request",
    };
    let notification = NotificationActiveModel {
        id: Set(NotificationId::new()),
        user_id: Set(user_id),
        kind: Set(kind),
        title: Set(title.to_string()),
        body: Set(body),
        related_id: Set(Some(friendship_id.into_uuid())),
        sender_id: Set(Some(sender.id)),
        sender_name: Set(Some(sender.name.clone())),
        preview: Set(None),
        is_read: Set(false),
        read_at: Set(None),
        created_at: Set(Utc::now()),
    };
    Notification::insert(notification)
        .exec_with_returning(conn)
        .await
}

#[derive(Clone)]
pub struct FriendshipsService {
    db: DatabaseConnection,
}

impl FriendshipsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Either direction counts as the same pair.
    async fn between<C: ConnectionTrait>(
        conn: &C,
        a: UserId,
        b: UserId,
    ) -> Result<Option<FriendshipModel>, DbErr> {
        Friendship::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(FriendshipColumn::RequesterId.eq(a))
                            .add(FriendshipColumn::RecipientId.eq(b)),
                    )
                    .add(
                        Condition::all()
                            .add(FriendshipColumn::RequesterId.eq(b))
                            .add(FriendshipColumn::RecipientId.eq(a)),
                    ),
            )
            .one(conn)
            .await
    }

    pub async fn request(
        &self,
        requester: UserId,
        request: FriendRequest,
    ) -> Result<FriendshipChange, FriendshipsServiceError> {
        if request.recipient_id == requester {
            return Err(FriendshipsServiceError::SelfRequest);
        }

        let txn = self.db.begin().await?;
        if User::find_by_id(request.recipient_id).one(&txn).await?.is_none() {
            return Err(FriendshipsServiceError::RecipientNotFound);
        }
        let sender = User::find_by_id(requester)
            .one(&txn)
            .await?
            .ok_or(FriendshipsServiceError::Forbidden)?;

        let now = Utc::now();
        let friendship = match Self::between(&txn, requester, request.recipient_id).await? {
            // A rejected pair may be asked again, in the new direction.
            Some(existing) if existing.status == FriendshipStatus::Rejected => {
                let mut active: FriendshipActiveModel = existing.into();
                active.requester_id = Set(requester);
                active.recipient_id = Set(request.recipient_id);
                active.status = Set(FriendshipStatus::Pending);
                active.requested_at = Set(now);
                active.responded_at = Set(None);
                active.update(&txn).await?
            }
            Some(_) => return Err(FriendshipsServiceError::AlreadyRequested),
            None => {
                let friendship = FriendshipActiveModel {
                    id: Set(FriendshipId::new()),
                    requester_id: Set(requester),
                    recipient_id: Set(request.recipient_id),
                    status: Set(FriendshipStatus::Pending),
                    requested_at: Set(now),
                    responded_at: Set(None),
                };
                Friendship::insert(friendship)
                    .exec_with_returning(&txn)
                    .await?
            }
        };

        let notification = notify(
            &txn,
            request.recipient_id,
            NotificationKind::FriendRequest,
            &sender,
            friendship.id,
            format!("{} sent you a friend request", sender.name),
        )
        .await?;
        txn.commit().await?;

        info!(friendship_id = %friendship.id, %requester, recipient = %request.recipient_id, "friend request sent");
        Ok(FriendshipChange {
            friendship,
            notification,
        })
    }

    async fn pending_for_recipient<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
        friendship_id: FriendshipId,
    ) -> Result<FriendshipModel, FriendshipsServiceError> {
        let friendship = Friendship::find_by_id(friendship_id)
            .one(conn)
            .await?
            .ok_or(FriendshipsServiceError::FriendshipNotFound)?;
        if friendship.recipient_id != user {
            return Err(FriendshipsServiceError::Forbidden);
        }
        if friendship.status != FriendshipStatus::Pending {
            return Err(FriendshipsServiceError::NotPending);
        }
        Ok(friendship)
    }

    pub async fn accept(
        &self,
        user: UserId,
        friendship_id: FriendshipId,
    ) -> Result<FriendshipChange, FriendshipsServiceError> {
        let txn = self.db.begin().await?;
        let friendship = Self::pending_for_recipient(&txn, user, friendship_id).await?;
        let accepter = User::find_by_id(user)
            .one(&txn)
            .await?
            .ok_or(FriendshipsServiceError::Forbidden)?;

        let requester = friendship.requester_id;
        let mut active: FriendshipActiveModel = friendship.into();
        active.status = Set(FriendshipStatus::Accepted);
        active.responded_at = Set(Some(Utc::now()));
        let friendship = active.update(&txn).await?;

        let notification = notify(
            &txn,
            requester,
            NotificationKind::FriendAccepted,
            &accepter,
            friendship.id,
            format!("{} accepted your friend request", accepter.name),
        )
        .await?;
        txn.commit().await?;

        info!(%friendship_id, "friend request accepted");
        Ok(FriendshipChange {
            friendship,
            notification,
        })
    }

    pub async fn reject(
        &self,
        user: UserId,
        friendship_id: FriendshipId,
    ) -> Result<FriendshipModel, FriendshipsServiceError> {
        let friendship = Self::pending_for_recipient(&self.db, user, friendship_id).await?;
        let mut active: FriendshipActiveModel = friendship.into();
        active.status = Set(FriendshipStatus::Rejected);
        active.responded_at = Set(Some(Utc::now()));
        let friendship = active.update(&self.db).await?;

        info!(%friendship_id, "friend request rejected");
        Ok(friendship)
    }

    /// Either side may remove the friendship or withdraw the request.
    pub async fn remove(
        &self,
        user: UserId,
        friendship_id: FriendshipId,
    ) -> Result<(), FriendshipsServiceError> {
        let friendship = Friendship::find_by_id(friendship_id)
            .one(&self.db)
            .await?
            .ok_or(FriendshipsServiceError::FriendshipNotFound)?;
        if friendship.requester_id != user && friendship.recipient_id != user {
            return Err(FriendshipsServiceError::Forbidden);
        }

        Friendship::delete_by_id(friendship_id)
            .exec(&self.db)
            .await?;
        info!(%friendship_id, %user, "friendship removed");
        Ok(())
    }

    async fn with_friends(
        &self,
        user: UserId,
        friendships: Vec<FriendshipModel>,
    ) -> Result<Vec<FriendView>, FriendshipsServiceError> {
        let other = |f: &FriendshipModel| {
            if f.requester_id == user {
                f.recipient_id
            } else {
                f.requester_id
            }
        };
        let ids: Vec<UserId> = friendships.iter().map(other).collect();
        let mut users: HashMap<UserId, UserModel> = User::find()
            .filter(UserColumn::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(friendships
            .into_iter()
            .map(|friendship| FriendView {
                friend: users.remove(&other(&friendship)),
                friendship,
            })
            .collect())
    }

    pub async fn list_friends(&self, user: UserId) -> Result<Vec<FriendView>, FriendshipsServiceError> {
        let friendships = Friendship::find()
            .filter(FriendshipColumn::Status.eq(FriendshipStatus::Accepted))
            .filter(
                Condition::any()
                    .add(FriendshipColumn::RequesterId.eq(user))
                    .add(FriendshipColumn::RecipientId.eq(user)),
            )
            .order_by_desc(FriendshipColumn::RespondedAt)
            .all(&self.db)
            .await?;
        self.with_friends(user, friendships).await
    }

    pub async fn sent_requests(&self, user: UserId) -> Result<Vec<FriendView>, FriendshipsServiceError> {
        let friendships = Friendship::find()
            .filter(FriendshipColumn::RequesterId.eq(user))
            .filter(FriendshipColumn::Status.eq(FriendshipStatus::Pending))
            .order_by_desc(FriendshipColumn::RequestedAt)
            .all(&self.db)
            .await?;
        self.with_friends(user, friendships).await
    }

    pub async fn received_requests(
        &self,
        user: UserId,
    ) -> Result<Vec<FriendView>, FriendshipsServiceError> {
        let friendships = Friendship::find()
            .filter(FriendshipColumn::RecipientId.eq(user))
            .filter(FriendshipColumn::Status.eq(FriendshipStatus::Pending))
            .order_by_desc(FriendshipColumn::RequestedAt)
            .all(&self.db)
            .await?;
        self.with_friends(user, friendships).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn setup() -> (FriendshipsService, UserModel, UserModel) {
        let db = test_utils::setup_db().await;
        let asha = test_utils::create_test_user(&db, "Asha", Role::Member).await;
        let ravi = test_utils::create_test_user(&db, "Ravi", Role::Member).await;
        (FriendshipsService::new(db), asha, ravi)
    }

    #[tokio::test]
    async fn test_request_and_accept() {
        let (service, asha, ravi) = setup().await;
        let sent = service
            .request(asha.id, FriendRequest { recipient_id: ravi.id })
            .await
            .unwrap();
        assert_eq!(sent.friendship.status, FriendshipStatus::Pending);
        assert_eq!(sent.notification.user_id, ravi.id);
        assert_eq!(sent.notification.kind, NotificationKind::FriendRequest);

        let received = service.received_requests(ravi.id).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].friend.as_ref().map(|u| u.id), Some(asha.id));

        // Only the recipient may answer.
        assert!(matches!(
            service.accept(asha.id, sent.friendship.id).await,
            Err(FriendshipsServiceError::Forbidden)
        ));

        let accepted = service.accept(ravi.id, sent.friendship.id).await.unwrap();
        assert_eq!(accepted.friendship.status, FriendshipStatus::Accepted);
        assert_eq!(accepted.notification.user_id, asha.id);
        let friends = service.list_friends(asha.id).await.unwrap();
        assert_eq!(friends[0].friend.as_ref().map(|u| u.id), Some(ravi.id));
    }

    #[tokio::test]
    async fn test_pair_is_unique_in_both_directions() {
        let (service, asha, ravi) = setup().await;
        service
            .request(asha.id, FriendRequest { recipient_id: ravi.id })
            .await
            .unwrap();
        assert!(matches!(
            service
                .request(ravi.id, FriendRequest { recipient_id: asha.id })
                .await,
            Err(FriendshipsServiceError::AlreadyRequested)
        ));
    }

    #[tokio::test]
    async fn test_rejected_pair_can_ask_again() {
        let (service, asha, ravi) = setup().await;
        let sent = service
            .request(asha.id, FriendRequest { recipient_id: ravi.id })
            .await
            .unwrap();
        service.reject(ravi.id, sent.friendship.id).await.unwrap();
        assert!(matches!(
            service.accept(ravi.id, sent.friendship.id).await,
            Err(FriendshipsServiceError::NotPending)
        ));

        let again = service
            .request(ravi.id, FriendRequest { recipient_id: asha.id })
            .await
            .unwrap();
        assert_eq!(again.friendship.id, sent.friendship.id);
        assert_eq!(again.friendship.requester_id, ravi.id);
        assert_eq!(service.sent_requests(ravi.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_and_unknown_requests() {
        let (service, asha, _) = setup().await;
        assert!(matches!(
            service
                .request(asha.id, FriendRequest { recipient_id: asha.id })
                .await,
            Err(FriendshipsServiceError::SelfRequest)
        ));
        assert!(matches!(
            service
                .request(asha.id, FriendRequest { recipient_id: UserId::new() })
                .await,
            Err(FriendshipsServiceError::RecipientNotFound)
        ));
    }

    #[tokio::test]
    async fn test_remove_by_either_side() {
        let (service, asha, ravi) = setup().await;
        let sent = service
            .request(asha.id, FriendRequest { recipient_id: ravi.id })
            .await
            .unwrap();
        assert!(matches!(
            service.remove(UserId::new(), sent.friendship.id).await,
            Err(FriendshipsServiceError::Forbidden)
        ));
        service.remove(ravi.id, sent.friendship.id).await.unwrap();
        assert!(service.sent_requests(asha.id).await.unwrap().is_empty());
    }
}
