//! Access and refresh token issuance.
//!
//! Both token kinds are HS256-signed JWTs. Access tokens carry the caller's
//! identity and role; refresh tokens carry only the user id and are signed
//! with their own secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::User;

use super::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub id: i64,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("{0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

fn validation() -> Validation {
    Validation::new(Algorithm::HS256)
}

pub fn issue_access_token(user: &User, config: &AuthConfig) -> Result<String, TokenError> {
    let now = chrono::Utc::now().timestamp();

    let claims = AccessClaims {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
        token_type: TokenType::Access,
        iat: now,
        exp: now + config.access_token_ttl.num_seconds(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

pub fn issue_refresh_token(user: &User, config: &AuthConfig) -> Result<String, TokenError> {
    let now = chrono::Utc::now().timestamp();

    let claims = RefreshClaims {
        id: user.id,
        token_type: TokenType::Refresh,
        iat: now,
        exp: now + config.refresh_token_ttl.num_seconds(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

pub fn verify_access_token(token: &str, config: &AuthConfig) -> Result<AccessClaims, TokenError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation(),
    )?;

    match data.claims.token_type {
        TokenType::Access => Ok(data.claims),
        TokenType::Refresh => Err(TokenError::Invalid),
    }
}

pub fn verify_refresh_token(
    token: &str,
    config: &AuthConfig,
) -> Result<RefreshClaims, TokenError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &validation(),
    )?;

    match data.claims.token_type {
        TokenType::Refresh => Ok(data.claims),
        TokenType::Access => Err(TokenError::Invalid),
    }
}

/// Both tokens handed out at login, registration and refresh.
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

pub fn issue_token_pair(user: &User, config: &AuthConfig) -> Result<TokenPair, TokenError> {
    Ok(TokenPair {
        token: issue_access_token(user, config)?,
        refresh_token: issue_refresh_token(user, config)?,
    })
}
