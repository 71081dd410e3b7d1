use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000002_create_institutes_table::Institute;
use super::m20251220_000007_create_activity_types_table::ActivityType;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivityTypeAssignment::Table)
                    .col(pk_uuid(ActivityTypeAssignment::Id))
                    .col(uuid(ActivityTypeAssignment::ActivityTypeId))
                    .col(uuid_null(ActivityTypeAssignment::InstituteId))
                    .col(string(ActivityTypeAssignment::Status))
                    .col(timestamp_with_time_zone(ActivityTypeAssignment::CreatedAt))
                    .col(timestamp_with_time_zone(ActivityTypeAssignment::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-type-assignment-activity_type_id")
                            .from(ActivityTypeAssignment::Table, ActivityTypeAssignment::ActivityTypeId)
                            .to(ActivityType::Table, ActivityType::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-type-assignment-institute_id")
                            .from(ActivityTypeAssignment::Table, ActivityTypeAssignment::InstituteId)
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
                    .name("idx_activity_type_assignments_type_institute")
                    .table(ActivityTypeAssignment::Table)
                    .col(ActivityTypeAssignment::ActivityTypeId)
                    .col(ActivityTypeAssignment::InstituteId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityTypeAssignment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ActivityTypeAssignment {
    Table,
    Id,
    ActivityTypeId,
    InstituteId,
    Status,
    CreatedAt,
    UpdatedAt,
}
