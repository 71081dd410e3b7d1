use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000001_create_users_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .col(pk_uuid(Attachment::Id))
                    .col(uuid_null(Attachment::UploaderId))
                    .col(string(Attachment::Url))
                    .col(string_null(Attachment::SecureUrl))
                    .col(string(Attachment::Filename))
                    .col(big_integer(Attachment::FileSize))
                    .col(string(Attachment::MimeType))
                    .col(string_null(Attachment::AssetId))
                    .col(string_null(Attachment::PublicId))
                    .col(string_null(Attachment::Format))
                    .col(string_null(Attachment::ResourceType))
                    .col(string_null(Attachment::Folder))
                    .col(integer_null(Attachment::Width))
                    .col(integer_null(Attachment::Height))
                    .col(timestamp_with_time_zone(Attachment::UploadedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-attachment-uploader_id")
                            .from(Attachment::Table, Attachment::UploaderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Attachment {
    Table,
    Id,
    UploaderId,
    Url,
    SecureUrl,
    Filename,
    FileSize,
    MimeType,
    AssetId,
    PublicId,
    Format,
    ResourceType,
    Folder,
    Width,
    Height,
    UploadedAt,
}
