use sea_orm_migration::{prelude::*, schema::*};

use super::m20251220_000001_create_users_table::User;
use super::m20251220_000002_create_institutes_table::Institute;
use super::m20251220_000004_create_programs_table::Program;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Student::Table)
                    .col(pk_uuid(Student::Id))
                    .col(uuid_uniq(Student::UserId))
                    .col(uuid(Student::InstituteId))
                    .col(uuid_null(Student::ProgramId))
                    .col(string(Student::RollNumber))
                    .col(integer_null(Student::Year))
                    .col(integer_null(Student::Semester))
                    .col(string_null(Student::Section))
                    .col(timestamp_with_time_zone(Student::CreatedAt))
                    .col(timestamp_with_time_zone(Student::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-student-user_id")
                            .from(Student::Table, Student::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-student-institute_id")
                            .from(Student::Table, Student::InstituteId)
                            .to(Institute::Table, Institute::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-student-program_id")
                            .from(Student::Table, Student::ProgramId)
                            .to(Program::Table, Program::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_students_institute_roll_number")
                    .table(Student::Table)
                    .col(Student::InstituteId)
                    .col(Student::RollNumber)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Student::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Student {
    Table,
    Id,
    UserId,
    InstituteId,
    ProgramId,
    RollNumber,
    Year,
    Semester,
    Section,
    CreatedAt,
    UpdatedAt,
}
