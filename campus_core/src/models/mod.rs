use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::CampusConfig;

pub mod migrator;

pub async fn open_or_create_db(config: &CampusConfig) -> Result<DatabaseConnection, DbErr> {
    info!("Connecting to database");
    Database::connect(config.database_url.as_str()).await
}

pub async fn migrate_up(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await
}
