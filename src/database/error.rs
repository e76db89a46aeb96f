use std::convert::Infallible;

use serde::Serialize;
use thiserror::Error as ThisError;
use warp::{
    http::StatusCode,
    reject::{Reject, Rejection},
    Reply,
};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidSession(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Cache failed: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_request(info: &str) -> Self {
        Self::InvalidRequest(info.to_string())
    }

    pub fn unauthorized(info: &str) -> Self {
        Self::Unauthorized(info.to_string())
    }

    pub fn invalid_session(info: &str) -> Self {
        Self::InvalidSession(info.to_string())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn data_integrity(info: &str) -> Self {
        Self::DataIntegrity(info.to_string())
    }

    pub fn internal(info: &str) -> Self {
        Self::Internal(info.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::InvalidSession(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DataIntegrity(_)
            | Error::Configuration(_)
            | Error::Query(_)
            | Error::Cache(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for Error {}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    errors: String,
}

/// Recover function for the consuming server's route tree. Maps crate errors
/// onto their status codes and masks internals behind a generic message.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Resource not found"))
    } else if let Some(e) = err.find::<Error>() {
        let status = e.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Internal error: {e}");
            (status, String::from("Internal server error"))
        } else {
            (status, e.to_string())
        }
    } else if err.find::<warp::reject::MissingCookie>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            String::from("Authentication required"),
        )
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    let body = warp::reply::json(&ErrorMessage {
        code: status.as_u16(),
        errors: message,
    });

    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_by_variant() {
        assert_eq!(
            Error::invalid_request("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::unauthorized("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::invalid_session("x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::data_integrity("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn query_errors_convert() {
        let e = Error::from(sqlx::Error::RowNotFound);
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
