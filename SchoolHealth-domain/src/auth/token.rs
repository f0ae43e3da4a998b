use std::env;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::token_blacklist;
use crate::auth::{Claims, Role};

/// Failures while issuing or checking access tokens
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("token rejected: {0}")]
    TokenValidation(String),

    #[error("token expired")]
    TokenExpired,

    #[error("malformed token")]
    InvalidToken,

    #[error("auth misconfigured: {0}")]
    ConfigError(String),

    /// The token was logged out before it expired
    #[error("token revoked")]
    TokenRevoked,
}

/// Who a token is issued to
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub id: String,
    pub role: Role,
    pub email: String,
    pub student_id: Option<String>,
}

fn jwt_secret() -> Result<String, SecurityError> {
    env::var("JWT_SECRET").map_err(|e| {
        error!("JWT_SECRET is not set: {}", e);
        SecurityError::ConfigError("JWT_SECRET is not set".to_string())
    })
}

fn issuer() -> String {
    env::var("JWT_ISSUER").unwrap_or_else(|_| "school-health-api".to_string())
}

/// Lifetime of an access token, from `ACCESS_TOKEN_EXPIRATION_HOURS`
pub fn access_token_lifetime() -> Duration {
    let hours = env::var("ACCESS_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|h| *h > 0)
        .unwrap_or(24);
    Duration::hours(hours)
}

/// Sign a new access token; returns the token and its claims
pub fn generate_token(subject: &TokenSubject) -> Result<(String, Claims), SecurityError> {
    let secret = jwt_secret()?;
    let now = Utc::now();
    let expiration = now + access_token_lifetime();

    let claims = Claims {
        sub: subject.id.clone(),
        role: subject.role,
        email: subject.email.clone(),
        student_id: subject.student_id.clone(),
        jti: Uuid::new_v4().to_string(),
        iss: issuer(),
        iat: now.timestamp(),
        exp: expiration.timestamp(),
    };

    let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| {
            error!("Could not sign token: {}", e);
            SecurityError::TokenValidation(e.to_string())
        })?;

    info!(role = %subject.role, subject = %subject.id, expires = %expiration, "issued access token");

    Ok((token, claims))
}

/// Validate a token and return its claims; revoked tokens are rejected
pub fn validate_token(token: &str) -> Result<Claims, SecurityError> {
    let secret = jwt_secret()?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_issuer(&[issuer()]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map_err(
        |e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken => SecurityError::InvalidToken,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                SecurityError::TokenValidation("bad signature".to_string())
            }
            _ => SecurityError::TokenValidation(e.to_string()),
        },
    )?;

    if token_blacklist::blacklist().contains(&token_data.claims.jti) {
        debug!("Rejected revoked token {}", token_data.claims.jti);
        return Err(SecurityError::TokenRevoked);
    }

    Ok(token_data.claims)
}

/// Blacklist a token until it would have expired
pub fn revoke_token(claims: &Claims) {
    let expires = UNIX_EPOCH + StdDuration::from_secs(claims.exp.max(0) as u64);
    let expires = expires.max(SystemTime::now());
    info!("Revoking token {} for {}", claims.jti, claims.sub);
    token_blacklist::blacklist().revoke(&claims.jti, expires);
}
