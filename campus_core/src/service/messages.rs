use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{sea_query::Expr, ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{AttachmentId, ChannelId, MessageId, UserId},
    service::{attachments::attachments_by_message, validate::Invalid, Page, PageRequest},
};

#[derive(Debug, Error)]
pub enum MessagesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("message not found")]
    MessageNotFound,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("attachment not found")]
    AttachmentNotFound,

    #[error("channel not found")]
    ChannelNotFound,

    #[error("not a member of this channel")]
    NotChannelMember,

    #[error("only the sender can delete this message")]
    NotSender,

    #[error("only the recipient can mark this message read")]
    NotRecipient,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDirectMessage {
    pub recipient_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChannelMessage {
    pub channel_id: ChannelId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub sort: SortOrder,
}

/// A message together with its attachment metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: MessageModel,
    pub attachments: Vec<AttachmentModel>,
}

/// A persisted group message and the members it must be delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDelivery {
    pub view: MessageView,
    pub recipients: Vec<UserId>,
}

fn check_body(content: &str, attachments: &[AttachmentId]) -> Result<String, Invalid> {
    let content = content.trim();
    if content.is_empty() && attachments.is_empty() {
        return Err(Invalid::new("message needs content or attachments"));
    }
    Ok(content.to_string())
}

async fn insert_message<C: ConnectionTrait>(
    conn: &C,
    message: MessageActiveModel,
    attachment_ids: &[AttachmentId],
) -> Result<MessageView, MessagesServiceError> {
    let mut seen = HashSet::new();
    let attachment_ids: Vec<AttachmentId> = attachment_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let mut attachments = if attachment_ids.is_empty() {
        Vec::new()
    } else {
        Attachment::find()
            .filter(AttachmentColumn::Id.is_in(attachment_ids.iter().copied()))
            .all(conn)
            .await?
    };
    if attachments.len() != attachment_ids.len() {
        return Err(MessagesServiceError::AttachmentNotFound);
    }
    attachments.sort_by_key(|a| attachment_ids.iter().position(|id| *id == a.id));

    let message = Message::insert(message).exec_with_returning(conn).await?;
    if !attachment_ids.is_empty() {
        let links = attachment_ids.iter().map(|&attachment_id| MessageAttachmentActiveModel {
            message_id: Set(message.id),
            attachment_id: Set(attachment_id),
        });
        MessageAttachment::insert_many(links)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(MessageView {
        message,
        attachments,
    })
}

#[derive(Clone)]
pub struct MessagesService {
    db: DatabaseConnection,
}

impl MessagesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn with_attachments(
        &self,
        messages: Vec<MessageModel>,
    ) -> Result<Vec<MessageView>, MessagesServiceError> {
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        let mut grouped = attachments_by_message(&self.db, &ids).await?;
        Ok(messages
            .into_iter()
            .map(|message| MessageView {
                attachments: grouped.remove(&message.id).unwrap_or_default(),
                message,
            })
            .collect())
    }

    pub async fn send_direct(
        &self,
        sender: UserId,
        new: NewDirectMessage,
    ) -> Result<MessageView, MessagesServiceError> {
        let content = check_body(&new.content, &new.attachments)?;

        let txn = self.db.begin().await?;
        if User::find_by_id(new.recipient_id).one(&txn).await?.is_none() {
            return Err(MessagesServiceError::RecipientNotFound);
        }
        let message = MessageActiveModel {
            id: Set(MessageId::new()),
            sender_id: Set(sender),
            recipient_id: Set(Some(new.recipient_id)),
            channel_id: Set(None),
            content: Set(content),
            is_read: Set(false),
            sent_at: Set(Utc::now()),
            read_at: Set(None),
        };
        let view = insert_message(&txn, message, &new.attachments).await?;
        txn.commit().await?;

        info!(message_id = %view.message.id, %sender, recipient = %new.recipient_id, "direct message saved");
        Ok(view)
    }

    async fn is_member<C: ConnectionTrait>(
        conn: &C,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<bool, DbErr> {
        Ok(ChannelMember::find_by_id((channel_id, user_id))
            .one(conn)
            .await?
            .is_some())
    }

    /// Saves a group message and returns everyone else in the channel.
    pub async fn send_to_channel(
        &self,
        sender: UserId,
        new: NewChannelMessage,
    ) -> Result<ChannelDelivery, MessagesServiceError> {
        let content = check_body(&new.content, &new.attachments)?;

        let txn = self.db.begin().await?;
        if Channel::find_by_id(new.channel_id).one(&txn).await?.is_none() {
            return Err(MessagesServiceError::ChannelNotFound);
        }
        if !Self::is_member(&txn, new.channel_id, sender).await? {
            return Err(MessagesServiceError::NotChannelMember);
        }

        let message = MessageActiveModel {
            id: Set(MessageId::new()),
            sender_id: Set(sender),
            recipient_id: Set(None),
            channel_id: Set(Some(new.channel_id)),
            content: Set(content),
            is_read: Set(false),
            sent_at: Set(Utc::now()),
            read_at: Set(None),
        };
        let view = insert_message(&txn, message, &new.attachments).await?;
        let recipients = ChannelMember::find()
            .filter(ChannelMemberColumn::ChannelId.eq(new.channel_id))
            .filter(ChannelMemberColumn::UserId.ne(sender))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        txn.commit().await?;

        info!(message_id = %view.message.id, channel_id = %new.channel_id, "channel message saved");
        Ok(ChannelDelivery { view, recipients })
    }

    pub async fn get_message(&self, message_id: MessageId) -> Result<MessageView, MessagesServiceError> {
        let message = Message::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(MessagesServiceError::MessageNotFound)?;
        let mut views = self.with_attachments(vec![message]).await?;
        views.pop().ok_or(MessagesServiceError::MessageNotFound)
    }

    /// Direct messages exchanged between two users, paged.
    pub async fn conversation(
        &self,
        user: UserId,
        other: UserId,
        query: ConversationQuery,
    ) -> Result<Page<MessageView>, MessagesServiceError> {
        let page = PageRequest::new(query.page, query.limit);
        let between = Condition::any()
            .add(
                Condition::all()
                    .add(MessageColumn::SenderId.eq(user))
                    .add(MessageColumn::RecipientId.eq(other)),
            )
            .add(
                Condition::all()
                    .add(MessageColumn::SenderId.eq(other))
                    .add(MessageColumn::RecipientId.eq(user)),
            );
        let select = Message::find().filter(between);

        let total = select.clone().count(&self.db).await?;
        let select = match query.sort {
            SortOrder::Asc => select.order_by_asc(MessageColumn::SentAt),
            SortOrder::Desc => select.order_by_desc(MessageColumn::SentAt),
        };
        let messages = select
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await?;
        let items = self.with_attachments(messages).await?;
        Ok(Page::new(items, page.page, page.limit, total))
    }

    pub async fn channel_messages(
        &self,
        user: UserId,
        channel_id: ChannelId,
        query: ConversationQuery,
    ) -> Result<Page<MessageView>, MessagesServiceError> {
        if !Self::is_member(&self.db, channel_id, user).await? {
            return Err(MessagesServiceError::NotChannelMember);
        }
        let page = PageRequest::new(query.page, query.limit);
        let select = Message::find().filter(MessageColumn::ChannelId.eq(channel_id));

        let total = select.clone().count(&self.db).await?;
        let select = match query.sort {
            SortOrder::Asc => select.order_by_asc(MessageColumn::SentAt),
            SortOrder::Desc => select.order_by_desc(MessageColumn::SentAt),
        };
        let messages = select
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await?;
        let items = self.with_attachments(messages).await?;
        Ok(Page::new(items, page.page, page.limit, total))
    }

    /// Marks the reader's unread messages among `message_ids` as read and
    /// returns the ones that changed.
    pub async fn mark_read(
        &self,
        reader: UserId,
        message_ids: &[MessageId],
    ) -> Result<Vec<MessageModel>, MessagesServiceError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let unread = Message::find()
            .filter(MessageColumn::Id.is_in(message_ids.iter().copied()))
            .filter(MessageColumn::RecipientId.eq(reader))
            .filter(MessageColumn::IsRead.eq(false))
            .all(&self.db)
            .await?;
        if unread.is_empty() {
            return Ok(unread);
        }

        let read_at = Utc::now();
        Message::update_many()
            .col_expr(MessageColumn::IsRead, Expr::value(true))
            .col_expr(MessageColumn::ReadAt, Expr::value(read_at))
            .filter(MessageColumn::Id.is_in(unread.iter().map(|m| m.id)))
            .exec(&self.db)
            .await?;

        Ok(unread
            .into_iter()
            .map(|m| MessageModel {
                is_read: true,
                read_at: Some(read_at),
                ..m
            })
            .collect())
    }

    pub async fn mark_one_read(
        &self,
        reader: UserId,
        message_id: MessageId,
    ) -> Result<MessageModel, MessagesServiceError> {
        let message = Message::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(MessagesServiceError::MessageNotFound)?;
        if message.recipient_id != Some(reader) {
            return Err(MessagesServiceError::NotRecipient);
        }
        if message.is_read {
            return Ok(message);
        }

        let mut active: MessageActiveModel = message.into();
        active.is_read = Set(true);
        active.read_at = Set(Some(Utc::now()));
        Ok(active.update(&self.db).await?)
    }

    /// Sender-only. Drops the message and the notifications it raised.
    pub async fn delete_message(
        &self,
        user: UserId,
        message_id: MessageId,
    ) -> Result<MessageModel, MessagesServiceError> {
        let txn = self.db.begin().await?;
        let message = Message::find_by_id(message_id)
            .one(&txn)
            .await?
            .ok_or(MessagesServiceError::MessageNotFound)?;
        if message.sender_id != user {
            return Err(MessagesServiceError::NotSender);
        }

        Notification::delete_many()
            .filter(NotificationColumn::Kind.eq(NotificationKind::Message))
            .filter(NotificationColumn::RelatedId.eq(message_id.into_uuid()))
            .exec(&txn)
            .await?;
        Message::delete_by_id(message_id).exec(&txn).await?;
        txn.commit().await?;

        info!(%message_id, %user, "message deleted");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::{
            attachments::{AttachmentsService, NewAttachment},
            notifications::{MessageNotice, NotificationsService},
        },
        test_utils,
    };

    struct Fixture {
        db: DatabaseConnection,
        service: MessagesService,
        asha: UserModel,
        ravi: UserModel,
    }

    async fn setup() -> Fixture {
        let db = test_utils::setup_db().await;
        let asha = test_utils::create_test_user(&db, "Asha", Role::Member).await;
        let ravi = test_utils::create_test_user(&db, "Ravi", Role::Member).await;
        Fixture {
            service: MessagesService::new(db.clone()),
            db,
            asha,
            ravi,
        }
    }

    fn text(recipient_id: UserId, content: &str) -> NewDirectMessage {
        NewDirectMessage {
            recipient_id,
            content: content.to_string(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let fx = setup().await;
        assert!(matches!(
            fx.service.send_direct(fx.asha.id, text(fx.ravi.id, "   ")).await,
            Err(MessagesServiceError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_message_with_attachment() {
        let fx = setup().await;
        let attachment = AttachmentsService::new(fx.db.clone())
            .create_attachment(
                fx.asha.id,
                NewAttachment {
                    url: "https://cdn.example.com/slides.pdf".to_string(),
                    secure_url: None,
                    filename: "slides.pdf".to_string(),
                    file_size: 10,
                    mime_type: "application/pdf".to_string(),
                    folder: None,
                },
            )
            .await
            .unwrap();

        let mut new = text(fx.ravi.id, "");
        new.attachments = vec![attachment.id];
        let sent = fx.service.send_direct(fx.asha.id, new).await.unwrap();
        assert_eq!(sent.attachments.len(), 1);

        let loaded = fx.service.get_message(sent.message.id).await.unwrap();
        assert_eq!(loaded.attachments, vec![attachment]);
    }

    #[tokio::test]
    async fn test_repeated_attachment_ids_are_linked_once() {
        let fx = setup().await;
        let attachments = AttachmentsService::new(fx.db.clone());
        let mut ids = Vec::new();
        for name in ["a.png", "b.png"] {
            let attachment = attachments
                .create_attachment(
                    fx.asha.id,
                    NewAttachment {
                        url: format!("https://cdn.example.com/{name}"),
                        secure_url: None,
                        filename: name.to_string(),
                        file_size: 4,
                        mime_type: "image/png".to_string(),
                        folder: None,
                    },
                )
                .await
                .unwrap();
            ids.push(attachment.id);
        }

        let mut new = text(fx.ravi.id, "photos");
        new.attachments = vec![ids[1], ids[0], ids[1]];
        let sent = fx.service.send_direct(fx.asha.id, new).await.unwrap();
        let sent_ids: Vec<_> = sent.attachments.iter().map(|a| a.id).collect();
        assert_eq!(sent_ids, vec![ids[1], ids[0]]);

        let links = MessageAttachment::find()
            .filter(MessageAttachmentColumn::MessageId.eq(sent.message.id))
            .count(&fx.db)
            .await
            .unwrap();
        assert_eq!(links, 2);
    }

    #[tokio::test]
    async fn test_conversation_paging_and_order() {
        let fx = setup().await;
        for i in 0..3 {
            fx.service
                .send_direct(fx.asha.id, text(fx.ravi.id, &format!("ping {i}")))
                .await
                .unwrap();
            fx.service
                .send_direct(fx.ravi.id, text(fx.asha.id, &format!("pong {i}")))
                .await
                .unwrap();
        }

        let page = fx
            .service
            .conversation(
                fx.asha.id,
                fx.ravi.id,
                ConversationQuery {
                    page: Some(1),
                    limit: Some(4),
                    sort: SortOrder::Asc,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 6);
        assert_eq!(page.items.len(), 4);
        assert_eq!(page.items[0].message.content, "ping 0");
    }

    #[tokio::test]
    async fn test_only_recipient_marks_read() {
        let fx = setup().await;
        let sent = fx
            .service
            .send_direct(fx.asha.id, text(fx.ravi.id, "hello"))
            .await
            .unwrap();

        let by_sender = fx.service.mark_read(fx.asha.id, &[sent.message.id]).await.unwrap();
        assert!(by_sender.is_empty());

        let read = fx.service.mark_read(fx.ravi.id, &[sent.message.id]).await.unwrap();
        assert_eq!(read.len(), 1);
        assert!(read[0].is_read);

        // Already read: nothing changes.
        assert!(fx
            .service
            .mark_read(fx.ravi.id, &[sent.message.id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_sender_only_and_clears_notifications() {
        let fx = setup().await;
        let sent = fx
            .service
            .send_direct(fx.asha.id, text(fx.ravi.id, "delete me"))
            .await
            .unwrap();
        let notifications = NotificationsService::new(fx.db.clone());
        notifications
            .notify_message(MessageNotice {
                recipient_id: fx.ravi.id,
                sender_id: fx.asha.id,
                sender_name: &fx.asha.name,
                message_id: sent.message.id,
                content: "delete me",
            })
            .await
            .unwrap();

        assert!(matches!(
            fx.service.delete_message(fx.ravi.id, sent.message.id).await,
            Err(MessagesServiceError::NotSender)
        ));
        fx.service
            .delete_message(fx.asha.id, sent.message.id)
            .await
            .unwrap();
        assert_eq!(notifications.unread_count(fx.ravi.id).await.unwrap(), 0);
        assert!(matches!(
            fx.service.get_message(sent.message.id).await,
            Err(MessagesServiceError::MessageNotFound)
        ));
    }
}
