use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000001_create_users_table::User;
use super::m20251220_000013_create_channels_table::Channel;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelMember::Table)
                    .col(uuid(ChannelMember::ChannelId))
                    .col(uuid(ChannelMember::UserId))
                    .col(timestamp_with_time_zone(ChannelMember::JoinedAt))
                    .primary_key(
                        Index::create()
                            .col(ChannelMember::ChannelId)
                            .col(ChannelMember::UserId)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-channel-member-channel_id")
                            .from(ChannelMember::Table, ChannelMember::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-channel-member-user_id")
                            .from(ChannelMember::Table, ChannelMember::UserId)
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
                    .name("idx_channel_members_user_id")
                    .table(ChannelMember::Table)
                    .col(ChannelMember::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChannelMember::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ChannelMember {
    Table,
    ChannelId,
    UserId,
    JoinedAt,
}
