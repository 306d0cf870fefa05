//! API Error Handling
//!
//! Uniform JSON error bodies carrying a machine code, a message and the
//! request id of the failed call.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AccountError, GameError};

/// Envelope returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Machine-readable error payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code such as NOT_FOUND or CONFLICT
    pub code: String,
    /// Text shown to the caller
    pub message: String,
    /// Extra context, free-form JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error raised by a handler, tagged with the request id
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    /// Request was well formed but the game state forbids it
    Conflict(String),
    InternalError(String),
    ServiceUnavailable(String),
}

impl ApiErrorKind {
    /// Status code, stable code string and message for the wire.
    fn http_parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::BadRequest(_) => "Bad Request",
            Self::Conflict(_) => "Conflict",
            Self::InternalError(_) => "Internal Error",
            Self::ServiceUnavailable(_) => "Service Unavailable",
        }
    }
}

impl ApiError {
    fn new(request_id: String, kind: ApiErrorKind) -> Self {
        Self { kind, request_id }
    }

    pub fn not_found(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::NotFound(message))
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::BadRequest(message))
    }

    pub fn conflict(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::Conflict(message))
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::InternalError(message))
    }

    pub fn service_unavailable(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::ServiceUnavailable(message))
    }

    /// Map a game operation rejection onto the HTTP surface.
    ///
    /// Gameplay rejections are conflicts: the request was valid, the
    /// current round state just forbids it.
    pub fn from_game_error(request_id: String, err: GameError) -> Self {
        match err {
            GameError::Account(AccountError::NotFound) => {
                Self::not_found(request_id, err.to_string())
            }
            GameError::EngineUnavailable => Self::service_unavailable(request_id, err.to_string()),
            GameError::BettingClosed
            | GameError::NotRunning
            | GameError::NotWaiting
            | GameError::NoActiveBet
            | GameError::Account(AccountError::InsufficientFunds { .. })
            | GameError::Account(AccountError::UsernameTaken) => {
                Self::conflict(request_id, err.to_string())
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, _, msg) = self.kind.http_parts();
        write!(f, "[{}] {}: {}", self.request_id, self.kind.label(), msg)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.kind.http_parts();
        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            },
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Currency;

    #[test]
    fn test_gameplay_rejections_are_conflicts() {
        let err = ApiError::from_game_error("req-1".to_string(), GameError::BettingClosed);
        assert!(matches!(err.kind, ApiErrorKind::Conflict(_)));

        let err = ApiError::from_game_error(
            "req-2".to_string(),
            GameError::Account(AccountError::InsufficientFunds {
                currency: Currency::Eth,
            }),
        );
        match &err.kind {
            ApiErrorKind::Conflict(msg) => assert_eq!(msg, "Insufficient ETH balance"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_user_maps_to_not_found() {
        let err = ApiError::from_game_error(
            "req-3".to_string(),
            GameError::Account(AccountError::NotFound),
        );
        assert!(matches!(err.kind, ApiErrorKind::NotFound(_)));
    }

    #[test]
    fn test_engine_unavailable_maps_to_503() {
        let err = ApiError::from_game_error("req-4".to_string(), GameError::EngineUnavailable);
        assert!(matches!(err.kind, ApiErrorKind::ServiceUnavailable(_)));
    }

    #[test]
    fn test_display_includes_request_id_and_label() {
        let err = ApiError::conflict("req-9".to_string(), "round already running".to_string());
        assert_eq!(
            err.to_string(),
            "[req-9] Conflict: round already running"
        );
    }
}
