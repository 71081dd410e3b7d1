use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000002_create_institutes_table::Institute;
use super::m20251220_000006_create_faculty_table::Faculty;
use super::m20251220_000009_create_activities_table::Activity;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Assignment::Table)
                    .col(pk_uuid(Assignment::Id))
                    .col(uuid_uniq(Assignment::ActivityId))
                    .col(uuid(Assignment::FacultyId))
                    .col(uuid(Assignment::InstituteId))
                    .col(timestamp_with_time_zone(Assignment::CreatedAt))
                    .col(timestamp_with_time_zone(Assignment::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assignment-activity_id")
                            .from(Assignment::Table, Assignment::ActivityId)
                            .to(Activity::Table, Activity::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assignment-faculty_id")
                            .from(Assignment::Table, Assignment::FacultyId)
                            .to(Faculty::Table, Faculty::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assignment-institute_id")
                            .from(Assignment::Table, Assignment::InstituteId)
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
                    .name("idx_assignments_faculty_id")
                    .table(Assignment::Table)
                    .col(Assignment::FacultyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assignment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Assignment {
    Table,
    Id,
    ActivityId,
    FacultyId,
    InstituteId,
    CreatedAt,
    UpdatedAt,
}
