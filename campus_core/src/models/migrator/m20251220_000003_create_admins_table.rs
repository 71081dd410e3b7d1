use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000001_create_users_table::User;
use super::m20251220_000002_create_institutes_table::Institute;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Admin::Table)
                    .col(pk_uuid(Admin::Id))
                    .col(uuid_uniq(Admin::UserId))
                    .col(uuid(Admin::InstituteId))
                    .col(timestamp_with_time_zone(Admin::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-admin-user_id")
                            .from(Admin::Table, Admin::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-admin-institute_id")
                            .from(Admin::Table, Admin::InstituteId)
                            .to(Institute::Table, Institute::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_admins_institute_id")
                    .table(Admin::Table)
                    .col(Admin::InstituteId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Admin::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Admin {
    Table,
    Id,
    UserId,
    InstituteId,
    CreatedAt,
}
