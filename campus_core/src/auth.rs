//! Password hashing and session tokens.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::user::Role;
use crate::ids::{AdminId, FacultyId, InstituteId, StudentId, UserId};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to hash password")]
    Hashing,

    #[error("invalid or expired session token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).map_err(|_| AuthError::Hashing)?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

/// Returns false for a wrong password and for a malformed stored hash alike.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Who a session belongs to, with the role profile ids resolved at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub institute_id: Option<InstituteId>,
    pub admin_id: Option<AdminId>,
    pub student_id: Option<StudentId>,
    pub faculty_id: Option<FacultyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institute_id: Option<InstituteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<AdminId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<FacultyId>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            institute_id: self.institute_id,
            admin_id: self.admin_id,
            student_id: self.student_id,
            faculty_id: self.faculty_id,
        }
    }
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            institute_id: identity.institute_id,
            admin_id: identity.admin_id,
            student_id: identity.student_id,
            faculty_id: identity.faculty_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new(),
            email: "asha@example.edu".to_string(),
            name: "Asha".to_string(),
            role: Role::Student,
            institute_id: Some(InstituteId::new()),
            admin_id: None,
            student_id: Some(StudentId::new()),
            faculty_id: None,
        }
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("secret123", "not-a-phc-string"));
    }

    #[test]
    fn test_token_carries_identity() {
        let signer = TokenSigner::new("k", 1);
        let who = identity();
        let token = signer.issue(&who).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.identity(), who);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = TokenSigner::new("a", 1).issue(&identity()).unwrap();
        assert!(TokenSigner::new("b", 1).verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = TokenSigner::new("k", -2).issue(&identity()).unwrap();
        assert!(TokenSigner::new("k", 1).verify(&token).is_err());
    }
}
