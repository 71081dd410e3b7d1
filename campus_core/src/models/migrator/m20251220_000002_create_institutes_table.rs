use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Institute::Table)
                    .col(pk_uuid(Institute::Id))
                    .col(string(Institute::Name))
                    .col(string(Institute::Kind))
                    .col(string_uniq(Institute::OfficialEmail))
                    .col(string(Institute::OfficialPhone))
                    .col(string(Institute::AddressLine1))
                    .col(string_null(Institute::AddressLine2))
                    .col(string(Institute::City))
                    .col(string(Institute::State))
                    .col(string(Institute::Pincode))
                    .col(boolean(Institute::IsAffiliated))
                    .col(string_null(Institute::AffiliationUniversity))
                    .col(string_null(Institute::AffiliationId))
                    .col(string_null(Institute::InstituteCode))
                    .col(integer_null(Institute::EstablishedYear))
                    .col(string_null(Institute::AccreditationStatus))
                    .col(string_null(Institute::Website))
                    .col(string_null(Institute::Logo))
                    .col(timestamp_with_time_zone(Institute::CreatedAt))
                    .col(timestamp_with_time_zone(Institute::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Institute::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Institute {
    Table,
    Id,
    Name,
    Kind,
    OfficialEmail,
    OfficialPhone,
    AddressLine1,
    AddressLine2,
    City,
    State,
    Pincode,
    IsAffiliated,
    AffiliationUniversity,
    AffiliationId,
    InstituteCode,
    EstablishedYear,
    AccreditationStatus,
    Website,
    Logo,
    CreatedAt,
    UpdatedAt,
}
