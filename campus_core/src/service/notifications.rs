use chrono::Utc;
use sea_orm::{sea_query::Expr, DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    entity::prelude::*,
    ids::{MessageId, NotificationId, UserId},
    service::{
        validate::{self, Invalid},
        Page, PageRequest,
    },
};

/// Unread notifications handed to a chat client in one batch.
pub const UNREAD_BATCH: u64 = 50;

#[derive(Debug, Error)]
pub enum NotificationsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("notification not found")]
    NotificationNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    #[serde(default = "system_kind")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub related_id: Option<Uuid>,
    #[serde(default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

fn system_kind() -> NotificationKind {
    NotificationKind::System
}

/// A chat message that should raise a notification for its recipient.
#[derive(Debug, Clone)]
pub struct MessageNotice<'a> {
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub sender_name: &'a str,
    pub message_id: MessageId,
    pub content: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub is_read: Option<bool>,
}

#[derive(Clone)]
pub struct NotificationsService {
    db: DatabaseConnection,
}

impl NotificationsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn active_model(new: NewNotification) -> Result<NotificationActiveModel, Invalid> {
        let title = validate::required("title", &new.title)?;
        let body = validate::required("body", &new.body)?;
        Ok(NotificationActiveModel {
            id: Set(NotificationId::new()),
            user_id: Set(new.user_id),
            kind: Set(new.kind),
            title: Set(title),
            body: Set(body),
            related_id: Set(new.related_id),
            sender_id: Set(new.sender_id),
            sender_name: Set(validate::optional(new.sender_name)),
            preview: Set(new.preview.as_deref().map(validate::preview)),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(Utc::now()),
        })
    }

    pub async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<NotificationModel, NotificationsServiceError> {
        if User::find_by_id(new.user_id).one(&self.db).await?.is_none() {
            return Err(NotificationsServiceError::UserNotFound);
        }
        let notification = Notification::insert(Self::active_model(new)?)
            .exec_with_returning(&self.db)
            .await?;
        debug!(notification_id = %notification.id, user_id = %notification.user_id, "notification created");
        Ok(notification)
    }

    /// All or nothing: one bad row rejects the whole batch.
    pub async fn bulk_create(
        &self,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<NotificationModel>, NotificationsServiceError> {
        let txn = self.db.begin().await?;
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            if User::find_by_id(new.user_id).one(&txn).await?.is_none() {
                return Err(NotificationsServiceError::UserNotFound);
            }
            let row = Notification::insert(Self::active_model(new)?)
                .exec_with_returning(&txn)
                .await?;
            created.push(row);
        }
        txn.commit().await?;

        info!(count = created.len(), "notifications created in bulk");
        Ok(created)
    }

    /// Returns the notification and whether it was newly created. A message
    /// never raises more than one notification per recipient.
    pub async fn notify_message(
        &self,
        notice: MessageNotice<'_>,
    ) -> Result<(NotificationModel, bool), NotificationsServiceError> {
        let existing = Notification::find()
            .filter(NotificationColumn::UserId.eq(notice.recipient_id))
            .filter(NotificationColumn::Kind.eq(NotificationKind::Message))
            .filter(NotificationColumn::RelatedId.eq(notice.message_id.into_uuid()))
            .one(&self.db)
            .await?;
        if let Some(existing) = existing {
            debug!(message_id = %notice.message_id, "message notification already exists");
            return Ok((existing, false));
        }

        let body = if notice.content.trim().is_empty() {
            "Sent an attachment".to_string()
        } else {
            validate::preview(notice.content)
        };
        let new = NewNotification {
            user_id: notice.recipient_id,
            kind: NotificationKind::Message,
            title: format!("New message from {}", notice.sender_name),
            body,
            related_id: Some(notice.message_id.into_uuid()),
            sender_id: Some(notice.sender_id),
            sender_name: Some(notice.sender_name.to_string()),
            preview: validate::optional(Some(notice.content.to_string())),
        };
        let notification = Notification::insert(Self::active_model(new)?)
            .exec_with_returning(&self.db)
            .await?;
        Ok((notification, true))
    }

    pub async fn get_notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<NotificationModel, NotificationsServiceError> {
        Notification::find_by_id(notification_id)
            .one(&self.db)
            .await?
            .ok_or(NotificationsServiceError::NotificationNotFound)
    }

    pub async fn list_for_user(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> Result<Page<NotificationModel>, NotificationsServiceError> {
        let page = PageRequest::new(query.page, query.limit);
        let mut select = Notification::find().filter(NotificationColumn::UserId.eq(user_id));
        if let Some(is_read) = query.is_read {
            select = select.filter(NotificationColumn::IsRead.eq(is_read));
        }

        let total = select.clone().count(&self.db).await?;
        let items = select
            .order_by_desc(NotificationColumn::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await?;
        Ok(Page::new(items, page.page, page.limit, total))
    }

    pub async fn list_unread(
        &self,
        user_id: UserId,
    ) -> Result<Vec<NotificationModel>, NotificationsServiceError> {
        Ok(Notification::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .order_by_desc(NotificationColumn::CreatedAt)
            .limit(UNREAD_BATCH)
            .all(&self.db)
            .await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<u64, NotificationsServiceError> {
        Ok(Notification::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .count(&self.db)
            .await?)
    }

    pub async fn list_by_kind(
        &self,
        user_id: UserId,
        kind: NotificationKind,
    ) -> Result<Vec<NotificationModel>, NotificationsServiceError> {
        Ok(Notification::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::Kind.eq(kind))
            .order_by_desc(NotificationColumn::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Marks one of the user's notifications read. Someone else's id reads as not found.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<NotificationModel, NotificationsServiceError> {
        let notification = self
            .get_notification(notification_id)
            .await?;
        if notification.user_id != user_id {
            return Err(NotificationsServiceError::NotificationNotFound);
        }
        if notification.is_read {
            return Ok(notification);
        }

        let mut active: NotificationActiveModel = notification.into();
        active.is_read = Set(true);
        active.read_at = Set(Some(Utc::now()));
        Ok(active.update(&self.db).await?)
    }

    pub async fn mark_many_read(
        &self,
        user_id: UserId,
        notification_ids: &[NotificationId],
    ) -> Result<u64, NotificationsServiceError> {
        if notification_ids.is_empty() {
            return Ok(0);
        }
        let result = Notification::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .col_expr(NotificationColumn::ReadAt, Expr::value(Utc::now()))
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .filter(NotificationColumn::Id.is_in(notification_ids.iter().copied()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, NotificationsServiceError> {
        let result = Notification::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .col_expr(NotificationColumn::ReadAt, Expr::value(Utc::now()))
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        info!(%user_id, count = result.rows_affected, "notifications marked read");
        Ok(result.rows_affected)
    }

    /// Clears the message notifications a reader got for messages they have now read.
    pub async fn mark_read_for_messages(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<u64, NotificationsServiceError> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let result = Notification::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .col_expr(NotificationColumn::ReadAt, Expr::value(Utc::now()))
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::Kind.eq(NotificationKind::Message))
            .filter(NotificationColumn::IsRead.eq(false))
            .filter(NotificationColumn::RelatedId.is_in(message_ids.iter().map(|id| id.into_uuid())))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_notification(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), NotificationsServiceError> {
        let result = Notification::delete_many()
            .filter(NotificationColumn::Id.eq(notification_id))
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(NotificationsServiceError::NotificationNotFound);
        }
        Ok(())
    }

    pub async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, NotificationsServiceError> {
        let result = Notification::delete_many()
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        info!(%user_id, count = result.rows_affected, "notifications cleared");
        Ok(result.rows_affected)
    }
}
