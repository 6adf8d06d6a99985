use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    payments::PaymentUseCaseError, subscriptions::SubscriptionUseCaseError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<PaymentUseCaseError> for AppError {
    fn from(err: PaymentUseCaseError) -> Self {
        match err {
            PaymentUseCaseError::Internal(err) => AppError::Internal(err),
            other => AppError::NotFound(other.to_string()),
        }
    }
}

impl From<SubscriptionUseCaseError> for AppError {
    fn from(err: SubscriptionUseCaseError) -> Self {
        match err {
            SubscriptionUseCaseError::SubscriptionNotFound => AppError::NotFound(err.to_string()),
            SubscriptionUseCaseError::NotRegistered => AppError::Conflict(err.to_string()),
            SubscriptionUseCaseError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(err) => {
                error!(error = ?err, "http: request failed");
                // Don't leak internal error detail to client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}
