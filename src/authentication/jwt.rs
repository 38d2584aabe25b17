use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_TTL_HOURS;
use crate::database::schema::User;
use crate::error::ApiError;

/// Claims carried by a signed session token. The token is opaque to
/// clients; everything needed to scope queries to the requesting user is in
/// here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl SessionData {
    fn new(user: &User, ttl: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            iat,
            exp,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret)
        .map_err(|_| ApiError::Internal(String::from("Session secret is unusable as an HMAC key")))
}

pub fn generate_session_token(user: &User, secret: &[u8]) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = SessionData::new(user, Duration::hours(SESSION_TTL_HOURS));

    claims
        .sign_with_key(&key)
        .map_err(|e| ApiError::Internal(format!("Failed to sign session token: {e}")))
}

pub fn verify_session_token(token: &str, secret: &[u8]) -> Result<SessionData, ApiError> {
    let key = signing_key(secret)?;

    let session: SessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::Unauthorized(String::from("Invalid session; Invalid token")))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(ApiError::Unauthorized(String::from(
            "Invalid session; Token expired",
        )));
    }

    Ok(session)
}
