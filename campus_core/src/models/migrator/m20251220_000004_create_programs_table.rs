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
                    .table(Program::Table)
                    .col(pk_uuid(Program::Id))
                    .col(uuid(Program::InstituteId))
                    .col(string(Program::Level))
                    .col(string(Program::Degree))
                    .col(string_null(Program::Branch))
                    .col(string_null(Program::Specialization))
                    .col(integer(Program::Intake))
                    .col(timestamp_with_time_zone(Program::CreatedAt))
                    .col(timestamp_with_time_zone(Program::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-program-institute_id")
                            .from(Program::Table, Program::InstituteId)
                            .to(Institute::Table, Institute::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique indexes treat NULLs as distinct; coalesce the optional columns.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_programs_unique_offering ON program \
                 (institute_id, level, degree, COALESCE(branch, ''), COALESCE(specialization, ''))",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Program::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Program {
    Table,
    Id,
    InstituteId,
    Level,
    Degree,
    Branch,
    Specialization,
    Intake,
    CreatedAt,
    UpdatedAt,
}
