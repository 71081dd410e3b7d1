use sea_orm_migration::prelude::*;

mod m20251220_000001_create_users_table;
mod m20251220_000002_create_institutes_table;
mod m20251220_000003_create_admins_table;
mod m20251220_000004_create_programs_table;
mod m20251220_000005_create_students_table;
mod m20251220_000006_create_faculty_table;
mod m20251220_000007_create_activity_types_table;
mod m20251220_000008_create_activity_type_assignments_table;
mod m20251220_000009_create_activities_table;
mod m20251220_000010_create_assignments_table;
mod m20251220_000011_create_attachments_table;
mod m20251220_000012_create_notifications_table;
mod m20251220_000013_create_channels_table;
mod m20251220_000014_create_channel_members_table;
mod m20251220_000015_create_messages_table;
mod m20251220_000016_create_message_attachments_table;
mod m20251220_000017_create_friendships_table;
mod m20251220_000018_create_academic_records_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251220_000001_create_users_table::Migration),
            Box::new(m20251220_000002_create_institutes_table::Migration),
            Box::new(m20251220_000003_create_admins_table::Migration),
            Box::new(m20251220_000004_create_programs_table::Migration),
            Box::new(m20251220_000005_create_students_table::Migration),
            Box::new(m20251220_000006_create_faculty_table::Migration),
            Box::new(m20251220_000007_create_activity_types_table::Migration),
            Box::new(m20251220_000008_create_activity_type_assignments_table::Migration),
            Box::new(m20251220_000009_create_activities_table::Migration),
            Box::new(m20251220_000010_create_assignments_table::Migration),
            Box::new(m20251220_000011_create_attachments_table::Migration),
            Box::new(m20251220_000012_create_notifications_table::Migration),
            Box::new(m20251220_000013_create_channels_table::Migration),
            Box::new(m20251220_000014_create_channel_members_table::Migration),
            Box::new(m20251220_000015_create_messages_table::Migration),
            Box::new(m20251220_000016_create_message_attachments_table::Migration),
            Box::new(m20251220_000017_create_friendships_table::Migration),
            Box::new(m20251220_000018_create_academic_records_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::{Database, DbErr};

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    assert!(schema_manager.has_table("user").await?);
    assert!(schema_manager.has_table("institute").await?);
    assert!(schema_manager.has_table("admin").await?);
    assert!(schema_manager.has_table("program").await?);
    assert!(schema_manager.has_table("student").await?);
    assert!(schema_manager.has_table("faculty").await?);
    assert!(schema_manager.has_table("activity_type").await?);
    assert!(schema_manager.has_table("activity_type_assignment").await?);
    assert!(schema_manager.has_table("activity").await?);
    assert!(schema_manager.has_table("assignment").await?);
    assert!(schema_manager.has_table("attachment").await?);
    assert!(schema_manager.has_table("notification").await?);
    assert!(schema_manager.has_table("channel").await?);
    assert!(schema_manager.has_table("channel_member").await?);
    assert!(schema_manager.has_table("message").await?);
    assert!(schema_manager.has_table("message_attachment").await?);
    assert!(schema_manager.has_table("friendship").await?);
    assert!(schema_manager.has_table("academic_record").await?);

    Ok(())
}
