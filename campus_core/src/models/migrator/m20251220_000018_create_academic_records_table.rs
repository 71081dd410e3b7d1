use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000005_create_students_table::Student;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AcademicRecord::Table)
                    .col(pk_uuid(AcademicRecord::Id))
                    .col(uuid_uniq(AcademicRecord::StudentId))
                    .col(string_null(AcademicRecord::Branch))
                    .col(integer(AcademicRecord::Year))
                    .col(string(AcademicRecord::Section))
                    .col(string_null(AcademicRecord::UniversityId))
                    .col(string(AcademicRecord::Course))
                    .col(string(AcademicRecord::Semester))
                    .col(timestamp_with_time_zone(AcademicRecord::CreatedAt))
                    .col(timestamp_with_time_zone(AcademicRecord::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-academic_record-student_id")
                            .from(AcademicRecord::Table, AcademicRecord::StudentId)
                            .to(Student::Table, Student::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AcademicRecord::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AcademicRecord {
    Table,
    Id,
    StudentId,
    Branch,
    Year,
    Section,
    UniversityId,
    Course,
    Semester,
    CreatedAt,
    UpdatedAt,
}
