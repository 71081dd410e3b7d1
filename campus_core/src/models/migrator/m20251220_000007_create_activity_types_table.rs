use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000002_create_institutes_table::Institute;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivityType::Table)
                    .col(pk_uuid(ActivityType::Id))
                    .col(string(ActivityType::Name))
                    .col(boolean(ActivityType::IsPrimitive))
                    .col(uuid_null(ActivityType::InstituteId))
                    .col(string_null(ActivityType::Description))
                    .col(string(ActivityType::Status))
                    .col(json(ActivityType::FormSchema))
                    .col(integer(ActivityType::MinCredit))
                    .col(integer(ActivityType::MaxCredit))
                    .col(timestamp_with_time_zone(ActivityType::CreatedAt))
                    .col(timestamp_with_time_zone(ActivityType::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-type-institute_id")
                            .from(ActivityType::Table, ActivityType::InstituteId)
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
                    .name("idx_activity_types_institute_status")
                    .table(ActivityType::Table)
                    .col(ActivityType::InstituteId)
                    .col(ActivityType::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_types_is_primitive")
                    .table(ActivityType::Table)
                    .col(ActivityType::IsPrimitive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityType::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ActivityType {
    Table,
    Id,
    Name,
    IsPrimitive,
    InstituteId,
    Description,
    Status,
    FormSchema,
    MinCredit,
    MaxCredit,
    CreatedAt,
    UpdatedAt,
}
