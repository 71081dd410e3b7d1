//! Signed direct-upload credentials for the media host.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::MediaConfig;

pub const DEFAULT_FOLDER: &str = "campus_uploads";
pub const DEFAULT_EAGER: &str = "c_pad,h_300,w_400|c_crop,h_200,w_260";
const SIGNATURE_LIFETIME_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub timestamp: i64,
    pub signature: String,
    pub signature_algorithm: &'static str,
    pub folder: String,
    pub eager: String,
}

/// Hex SHA-256 over the sorted `key=value` pairs joined by `&`, followed by the secret.
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn upload_credentials_at(config: &MediaConfig, folder: Option<&str>, now: i64) -> UploadCredentials {
    let folder = folder
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FOLDER)
        .to_string();
    let timestamp = now + SIGNATURE_LIFETIME_SECS;
    let ts = timestamp.to_string();

    let signature = sign_params(
        &[("eager", DEFAULT_EAGER), ("folder", &folder), ("timestamp", &ts)],
        &config.api_secret,
    );

    UploadCredentials {
        cloud_name: config.cloud_name.clone(),
        api_key: config.api_key.clone(),
        timestamp,
        signature,
        signature_algorithm: "sha256",
        folder,
        eager: DEFAULT_EAGER.to_string(),
    }
}

pub fn upload_credentials(config: &MediaConfig, folder: Option<&str>) -> UploadCredentials {
    upload_credentials_at(config, folder, Utc::now().timestamp())
}
