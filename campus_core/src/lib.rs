pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod media;
pub mod models;
pub mod service;

#[cfg(test)]
mod test_utils;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::{
    auth::TokenSigner,
    config::CampusConfig,
    error::StartupError,
    service::{
        academic::AcademicService, accounts::AccountsService, activities::ActivitiesService,
        activity_types::ActivityTypesService, admins::AdminsService,
        assignments::AssignmentsService, attachments::AttachmentsService,
        channels::ChannelsService, faculty::FacultyService, friendships::FriendshipsService,
        institutes::InstitutesService, messages::MessagesService,
        notifications::NotificationsService, programs::ProgramsService,
        students::StudentsService, users::UsersService,
    },
};

/// Main runtime handle: configuration, the database and every domain service.
#[derive(Clone)]
pub struct CampusCore {
    pub config: CampusConfig,
    pub db: DatabaseConnection,
    pub signer: TokenSigner,

    pub accounts: AccountsService,
    pub academic: AcademicService,
    pub users: UsersService,
    pub institutes: InstitutesService,
    pub admins: AdminsService,
    pub students: StudentsService,
    pub faculty: FacultyService,
    pub programs: ProgramsService,
    pub activity_types: ActivityTypesService,
    pub activities: ActivitiesService,
    pub assignments: AssignmentsService,
    pub attachments: AttachmentsService,
    pub notifications: NotificationsService,
    pub messages: MessagesService,
    pub friendships: FriendshipsService,
    pub channels: ChannelsService,
}

impl CampusCore {
    /// Connects to the configured database, applies pending migrations and
    /// builds the services.
    pub async fn start(config: CampusConfig) -> Result<Self, StartupError> {
        let db = models::open_or_create_db(&config).await?;
        models::migrate_up(&db).await?;
        info!("database ready");

        Ok(Self::with_db(config, db))
    }

    pub fn with_db(config: CampusConfig, db: DatabaseConnection) -> Self {
        let signer = TokenSigner::new(&config.token_secret, config.token_ttl_hours);
        Self {
            accounts: AccountsService::new(db.clone(), signer.clone()),
            users: UsersService::new(db.clone()),
            academic: AcademicService::new(db.clone()),
            institutes: InstitutesService::new(db.clone()),
            admins: AdminsService::new(db.clone()),
            students: StudentsService::new(db.clone()),
            faculty: FacultyService::new(db.clone()),
            programs: ProgramsService::new(db.clone()),
            activity_types: ActivityTypesService::new(db.clone()),
            activities: ActivitiesService::new(db.clone()),
            assignments: AssignmentsService::new(db.clone()),
            attachments: AttachmentsService::new(db.clone()),
            notifications: NotificationsService::new(db.clone()),
            messages: MessagesService::new(db.clone()),
            friendships: FriendshipsService::new(db.clone()),
            channels: ChannelsService::new(db.clone()),
            signer,
            config,
            db,
        }
    }

    pub async fn shutdown(self) -> Result<(), StartupError> {
        self.db.close().await?;
        Ok(())
    }
}

pub mod prelude {
    pub use super::auth;
    pub use super::config;
    pub use super::entity;
    pub use super::error;
    pub use super::ids;
    pub use super::media;
    pub use super::models;
    pub use super::service;

    pub use super::CampusCore;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_with_ephemeral_config() {
        let core = CampusCore::start(CampusConfig::ephemeral())
            .await
            .expect("core failed to start");
        assert!(core.users.search_users(None, 10).await.unwrap().is_empty());
        core.shutdown().await.unwrap();
    }
}
