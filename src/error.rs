use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::models::response::ErrorResponse;

/// Rejected ingress request. Never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields")]
    MissingFields(Vec<&'static str>),

    #[error("unsupported channel")]
    UnsupportedChannel(String),

    #[error("metadata must be an object")]
    InvalidMetadata,

    #[error("invalid request body")]
    MalformedBody(String),
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(err) => {
                warn!(error = ?err, "Rejected notification request");

                let message = err.to_string();
                let body = match err {
                    ValidationError::MissingFields(fields) => {
                        ErrorResponse::new(message).with_fields(fields)
                    }
                    ValidationError::UnsupportedChannel(channel) => {
                        ErrorResponse::new(message).with_channel(channel)
                    }
                    ValidationError::InvalidMetadata | ValidationError::MalformedBody(_) => {
                        ErrorResponse::new(message)
                    }
                };

                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::DependencyUnavailable(detail) => {
                error!(error = %detail, "Request failed");

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("internal error")),
                )
                    .into_response()
            }
        }
    }
}

/// A single failed attempt at the external send capability.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("provider rejected delivery: {0}")]
    Provider(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid delivery task: {0}")]
    InvalidTask(String),
}

/// Startup connection gave up.
#[derive(Debug, Error)]
#[error("could not connect to {target} after {attempts} attempts: {last_error}")]
pub struct ConnectError {
    pub target: String,
    pub attempts: u32,
    pub last_error: String,
}
