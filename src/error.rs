use std::convert::Infallible;

use serde_json::json;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{reject, Rejection, Reply};

/// Request-level error taxonomy. Every failure surfaces synchronously as one
/// of these variants and maps onto a single HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed on `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    Unauthorized(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body. Validation errors keep the field-level shape
    /// `{"<field>": ["<message>"]}`, everything else is `{"detail": ...}`.
    pub fn body(&self) -> serde_json::Value {
        match self {
            ApiError::Validation { field, message } => {
                let mut fields = serde_json::Map::new();
                fields.insert(field.clone(), json!([message]));
                serde_json::Value::Object(fields)
            }
            ApiError::Unauthorized(message) => json!({ "detail": message }),
            ApiError::NotFound => json!({ "detail": "Not found." }),
            ApiError::Internal(_) => json!({ "detail": "Internal server error." }),
        }
    }
}

impl reject::Reject for ApiError {}

/// Terminal `recover` handler turning every rejection into a JSON response.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(error) = err.find::<ApiError>() {
        if let ApiError::Internal(info) = error {
            log::error!("internal error: {info}");
        }
        (error.status(), error.body())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "detail": e.to_string() }))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, json!({ "detail": "Invalid query string." }))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Payload too large." }),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed." }),
        )
    } else {
        log::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "detail": "Internal server error." }),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
