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
                    .table(Faculty::Table)
                    .col(pk_uuid(Faculty::Id))
                    .col(uuid_uniq(Faculty::UserId))
                    .col(uuid(Faculty::InstituteId))
                    .col(string(Faculty::EmployeeCode))
                    .col(string(Faculty::Department))
                    .col(string(Faculty::Designation))
                    .col(string_null(Faculty::SubjectArea))
                    .col(timestamp_with_time_zone(Faculty::CreatedAt))
                    .col(timestamp_with_time_zone(Faculty::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-faculty-user_id")
                            .from(Faculty::Table, Faculty::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-faculty-institute_id")
                            .from(Faculty::Table, Faculty::InstituteId)
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
                    .name("idx_faculty_institute_employee_code")
                    .table(Faculty::Table)
                    .col(Faculty::InstituteId)
                    .col(Faculty::EmployeeCode)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Faculty::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Faculty {
    Table,
    Id,
    UserId,
    InstituteId,
    EmployeeCode,
    Department,
    Designation,
    SubjectArea,
    CreatedAt,
    UpdatedAt,
}
