use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

static DATA_DIR_NAME: &str = "campus";
static CAMPUS_DB_NAME: &str = "campus_db.sqlite";
static CONFIG_FILE_NAME: &str = "config.json";

// data_dir_path
// |- campus
//    |- campus_db.sqlite
//    |- config.json

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no data directory available on this platform")]
    NoDataDir,

    #[error("failed to read or write config file")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid json")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidEnv { key: String, reason: String },
}

fn default_token_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn default_port() -> u16 {
    3000
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

fn default_clients_url() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MediaConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CampusConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Any sea-orm connection string. Defaults to a sqlite file in the data dir.
    pub database_url: String,

    /// HMAC key for session tokens.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Allowed CORS origins.
    #[serde(default = "default_clients_url")]
    pub clients_url: Vec<String>,

    #[serde(default)]
    pub media: MediaConfig,

    /// Marks cookies `Secure`.
    #[serde(default)]
    pub production: bool,
}

impl CampusConfig {
    /// Creates a config with a fresh token secret and a sqlite database under `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        let database_path = data_dir.join(CAMPUS_DB_NAME);

        CampusConfig {
            port: default_port(),
            database_url: format!("sqlite://{}?mode=rwc", database_path.display()),
            token_secret: default_token_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            clients_url: default_clients_url(),
            media: MediaConfig::default(),
            production: false,
        }
    }

    /// In-memory database and fixed secrets, for tests and local tooling.
    pub fn ephemeral() -> Self {
        CampusConfig {
            database_url: "sqlite::memory:".to_string(),
            token_secret: "campus-test-secret".to_string(),
            media: MediaConfig {
                cloud_name: "demo".to_string(),
                api_key: "1234567890".to_string(),
                api_secret: "media-secret".to_string(),
            },
            ..CampusConfig::new(PathBuf::from("."))
        }
    }

    /// Applies `PORT`, `DATABASE_URL`, `JWT_SECRET`, `JWT_TTL_HOURS`, `CLIENTS_URL`,
    /// `CLOUDINARY_*` and `CAMPUS_ENV` on top of the file values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = try_load("PORT")? {
            self.port = port;
        }
        if let Some(url) = try_load::<String>("DATABASE_URL")? {
            self.database_url = url;
        }
        if let Some(secret) = try_load::<String>("JWT_SECRET")? {
            self.token_secret = secret;
        }
        if let Some(ttl) = try_load("JWT_TTL_HOURS")? {
            self.token_ttl_hours = ttl;
        }
        if let Some(origins) = try_load::<String>("CLIENTS_URL")? {
            self.clients_url = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(cloud_name) = try_load::<String>("CLOUDINARY_CLOUDNAME")? {
            self.media.cloud_name = cloud_name;
        }
        if let Some(api_key) = try_load::<String>("CLOUDINARY_API_KEY")? {
            self.media.api_key = api_key;
        }
        if let Some(secret) = try_load::<String>("CLOUDINARY_SECRET")? {
            self.media.api_secret = secret;
        }
        if let Some(mode) = try_load::<String>("CAMPUS_ENV")? {
            self.production = mode.eq_ignore_ascii_case("production");
        }
        Ok(())
    }
}

fn try_load<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::InvalidEnv {
                key: key.to_string(),
                reason: e.to_string(),
            }
        }),
        Err(_) => Ok(None),
    }
}

/// Gets the existing config or initializes a new one, then applies environment overrides.
pub async fn get_or_init() -> Result<CampusConfig, ConfigError> {
    let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;

    let campus_dir = data_dir.join(DATA_DIR_NAME);
    let config_path = campus_dir.join(CONFIG_FILE_NAME);

    fs::create_dir_all(&campus_dir).await?;

    let mut config = if fs::try_exists(&config_path).await? {
        let mut file = fs::File::open(&config_path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        serde_json::from_str(&contents)?
    } else {
        let config = CampusConfig::new(campus_dir.clone());

        let json = serde_json::to_string_pretty(&config)?;
        let mut file = fs::File::create(&config_path).await?;
        file.write_all(json.as_bytes()).await?;
        info!("Wrote new config to {}", config_path.display());

        config
    };

    config.apply_env()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_points_at_data_dir() {
        let config = CampusConfig::new(PathBuf::from("/tmp/campus"));
        assert_eq!(
            config.database_url,
            "sqlite:///tmp/campus/campus_db.sqlite?mode=rwc"
        );
        assert_eq!(config.token_secret.len(), 64);
        assert!(!config.production);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = CampusConfig::new(PathBuf::from("."));
        let b = CampusConfig::new(PathBuf::from("."));
        assert_ne!(a.token_secret, b.token_secret);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: CampusConfig =
            serde_json::from_str(r#"{"database_url":"sqlite::memory:"}"#).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl_hours, 168);
        assert_eq!(config.clients_url, vec!["http://localhost:5173".to_string()]);
        assert!(config.media.api_secret.is_empty());
    }
}
