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
                    .table(Friendship::Table)
                    .col(pk_uuid(Friendship::Id))
                    .col(uuid(Friendship::RequesterId))
                    .col(uuid(Friendship::RecipientId))
                    .col(string(Friendship::Status))
                    .col(timestamp_with_time_zone(Friendship::RequestedAt))
                    .col(timestamp_with_time_zone_null(Friendship::RespondedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-friendship-requester_id")
                            .from(Friendship::Table, Friendship::RequesterId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-friendship-recipient_id")
                            .from(Friendship::Table, Friendship::RecipientId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_friendships_pair")
                    .table(Friendship::Table)
                    .col(Friendship::RequesterId)
                    .col(Friendship::RecipientId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_friendships_recipient_status")
                    .table(Friendship::Table)
                    .col(Friendship::RecipientId)
                    .col(Friendship::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Friendship::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Friendship {
    Table,
    Id,
    RequesterId,
    RecipientId,
    Status,
    RequestedAt,
    RespondedAt,
}
