//! Error taxonomy for the write paths of the bridge

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown session token")]
    InvalidToken,
    #[error("x and y must be finite numbers")]
    InvalidMotionData,
    #[error("could not generate a unique token after {attempts} attempts")]
    TokenGenerationExhausted { attempts: usize },
    #[error("session store is full ({max_sessions} sessions)")]
    AtCapacity { max_sessions: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Stable name reported in the `error` field of JSON replies
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidToken => "InvalidToken",
            BridgeError::InvalidMotionData => "InvalidMotionData",
            BridgeError::TokenGenerationExhausted { .. } => "TokenGenerationExhausted",
            BridgeError::AtCapacity { .. } => "AtCapacity",
            BridgeError::Io(_) => "Io",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::InvalidToken => StatusCode::NOT_FOUND,
            BridgeError::InvalidMotionData => StatusCode::BAD_REQUEST,
            BridgeError::AtCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::TokenGenerationExhausted { .. } | BridgeError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
