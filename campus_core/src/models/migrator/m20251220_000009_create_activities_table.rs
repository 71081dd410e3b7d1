use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000002_create_institutes_table::Institute;
use super::m20251220_000005_create_students_table::Student;
use super::m20251220_000007_create_activity_types_table::ActivityType;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .col(pk_uuid(Activity::Id))
                    .col(uuid(Activity::StudentId))
                    .col(uuid(Activity::InstituteId))
                    .col(uuid_null(Activity::ActivityTypeId))
                    .col(string(Activity::Kind))
                    .col(string(Activity::Title))
                    .col(string_null(Activity::Description))
                    .col(string(Activity::Status))
                    .col(json(Activity::Details))
                    .col(string_null(Activity::Remarks))
                    .col(timestamp_with_time_zone_null(Activity::DateStart))
                    .col(timestamp_with_time_zone_null(Activity::DateEnd))
                    .col(timestamp_with_time_zone(Activity::CreatedAt))
                    .col(timestamp_with_time_zone(Activity::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-student_id")
                            .from(Activity::Table, Activity::StudentId)
                            .to(Student::Table, Student::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-institute_id")
                            .from(Activity::Table, Activity::InstituteId)
                            .to(Institute::Table, Institute::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activity-activity_type_id")
                            .from(Activity::Table, Activity::ActivityTypeId)
                            .to(ActivityType::Table, ActivityType::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activities_student_id")
                    .table(Activity::Table)
                    .col(Activity::StudentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activities_institute_status")
                    .table(Activity::Table)
                    .col(Activity::InstituteId)
                    .col(Activity::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Activity {
    Table,
    Id,
    StudentId,
    InstituteId,
    ActivityTypeId,
    Kind,
    Title,
    Description,
    Status,
    Details,
    Remarks,
    DateStart,
    DateEnd,
    CreatedAt,
    UpdatedAt,
}
