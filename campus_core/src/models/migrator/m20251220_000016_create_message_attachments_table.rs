use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000011_create_attachments_table::Attachment;
use super::m20251220_000015_create_messages_table::Message;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageAttachment::Table)
                    .col(uuid(MessageAttachment::MessageId))
                    .col(uuid(MessageAttachment::AttachmentId))
                    .primary_key(
                        Index::create()
                            .col(MessageAttachment::MessageId)
                            .col(MessageAttachment::AttachmentId)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-attachment-message_id")
                            .from(MessageAttachment::Table, MessageAttachment::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-message-attachment-attachment_id")
                            .from(MessageAttachment::Table, MessageAttachment::AttachmentId)
                            .to(Attachment::Table, Attachment::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageAttachment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MessageAttachment {
    Table,
    MessageId,
    AttachmentId,
}
