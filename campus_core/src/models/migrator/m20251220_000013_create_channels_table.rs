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
                    .table(Channel::Table)
                    .col(pk_uuid(Channel::Id))
                    .col(string(Channel::Name))
                    .col(string_null(Channel::Description))
                    .col(uuid(Channel::OwnerId))
                    .col(timestamp_with_time_zone(Channel::CreatedAt))
                    .col(timestamp_with_time_zone(Channel::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-channel-owner_id")
                            .from(Channel::Table, Channel::OwnerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Channel::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Channel {
    Table,
    Id,
    Name,
    Description,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}
