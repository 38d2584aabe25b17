use std::convert::Infallible;

use sqlx::{Pool, Postgres};
use warp::{reject, Filter, Rejection};

use super::jwt::{verify_session_token, SessionData};
use crate::config::Config;
use crate::error::ApiError;

pub fn with_db(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

pub fn with_config(config: Config) -> impl Filter<Extract = (Config,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

/// Requires a valid bearer token in the `Authorization` header and extracts
/// the session claims. Both `Bearer <token>` and `Token <token>` prefixes
/// are accepted.
pub fn with_session(
    secret: Vec<u8>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            let header = header.ok_or_else(|| {
                reject::custom(ApiError::Unauthorized(String::from(
                    "Authentication credentials were not provided.",
                )))
            })?;
            let token = bearer_token(&header).ok_or_else(|| {
                reject::custom(ApiError::Unauthorized(String::from(
                    "Invalid authorization header.",
                )))
            })?;

            verify_session_token(token, &secret).map_err(reject::custom)
        }
    })
}

fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();

    for prefix in ["Bearer ", "Token "] {
        if let Some(token) = header.strip_prefix(prefix) {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }

    None
}
