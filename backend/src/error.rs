//! Error types for the session relay
//!
//! Provides the client-facing error taxonomy and its mapping onto HTTP
//! statuses and JSON error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::protocol::ErrorResponse;
use thiserror::Error;

/// Errors that can occur while operating on a session
#[derive(Error, Debug)]
pub enum RelayError {
    /// No session exists for the given identifier
    #[error("Game not found")]
    SessionNotFound,

    /// Both seats are already taken
    #[error("Game is full")]
    SessionFull,

    /// Moves are rejected until the second player joins
    #[error("Waiting for opponent")]
    OpponentPending,

    /// The rules engine rejected the move
    #[error("Invalid move")]
    IllegalMove {
        /// Rejection reason reported by the rules engine
        reason: String,
    },

    /// Undo requested on an empty move history
    #[error("No move to undo")]
    NoMoveToUndo,

    /// A required request field is missing or empty
    #[error("{0}")]
    InvalidRequest(&'static str),
}

impl RelayError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::SessionNotFound => StatusCode::NOT_FOUND,
            RelayError::SessionFull
            | RelayError::OpponentPending
            | RelayError::IllegalMove { .. }
            | RelayError::NoMoveToUndo
            | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            details: match &self {
                RelayError::IllegalMove { reason } => Some(reason.clone()),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
