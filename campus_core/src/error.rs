use sea_orm::DbErr;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures while bringing the core up. Service-level failures live on each
/// service's own error enum.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("database unavailable")]
    Database(#[from] DbErr),
}
