//! Chat hub error types.
//!
//! `HubError` is returned by hub operations and by the REST handlers; the
//! `IntoResponse` impl maps it to an HTTP status with a generic client
//! message. `DropReason` describes why an inbound frame was discarded. Frames
//! are never answered with an error frame, so drop reasons only surface in
//! logs and metrics.

use crate::conference::ConferenceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Chat hub error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound, ConferenceNotFound: 404 Not Found
/// - ConferenceFull: 409 Conflict
/// - BadRequest: 400 Bad Request
/// - ShuttingDown: 503 Service Unavailable
/// - Store, Directory, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conference not found")]
    ConferenceNotFound,

    #[error("Conference is full ({capacity} participants)")]
    ConferenceFull { capacity: usize },

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Message store call failed.
    #[error("Message store error: {0}")]
    Store(String),

    /// Room directory call failed.
    #[error("Room directory error: {0}")]
    Directory(String),

    #[error("Hub is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::InvalidToken(_) => 401,
            HubError::Forbidden(_) => 403,
            HubError::NotFound(_) | HubError::ConferenceNotFound => 404,
            HubError::ConferenceFull { .. } => 409,
            HubError::BadRequest(_) => 400,
            HubError::ShuttingDown => 503,
            HubError::Store(_) | HubError::Directory(_) | HubError::Internal(_) => 500,
        }
    }
}

impl From<ConferenceError> for HubError {
    fn from(err: ConferenceError) -> Self {
        match err {
            ConferenceError::NotFound => HubError::ConferenceNotFound,
            ConferenceError::Full { capacity } => HubError::ConferenceFull { capacity },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            HubError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            HubError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            HubError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            HubError::ConferenceNotFound => (
                StatusCode::NOT_FOUND,
                "CONFERENCE_NOT_FOUND",
                "Conference not found".to_string(),
            ),
            HubError::ConferenceFull { capacity } => (
                StatusCode::CONFLICT,
                "CONFERENCE_FULL",
                format!("Conference is full ({capacity} participants)"),
            ),
            HubError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            HubError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SHUTTING_DOWN",
                "Service temporarily unavailable".to_string(),
            ),
            HubError::Store(err) | HubError::Directory(err) | HubError::Internal(err) => {
                tracing::error!(target: "hub.errors", error = %err, "Request failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"chat-hub\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Why an inbound frame was discarded without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Raw frame exceeded the configured byte limit.
    Oversized,
    /// Not valid JSON, unknown or server-only type tag, or wrong field types.
    Malformed,
    /// Parsed, but the payload shape does not fit the type.
    Invalid,
    /// Sender is not a member of the declared room, or the room does not exist.
    NotMember,
    /// Edit/delete of a message that does not exist in that room.
    UnknownMessage,
    /// Edit/delete of a message authored by someone else.
    NotOwner,
    /// Conference id does not exist.
    UnknownConference,
    /// Conference already at capacity.
    ConferenceFull,
    /// Conference relay to a user who is not in the sender's conference.
    NotConferencePeer,
    /// An external collaborator failed; nothing was fanned out.
    CollaboratorFailure,
    /// Sender's connection was replaced or already torn down.
    StaleConnection,
}

impl DropReason {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::Oversized => "oversized",
            DropReason::Malformed => "malformed",
            DropReason::Invalid => "invalid",
            DropReason::NotMember => "not_member",
            DropReason::UnknownMessage => "unknown_message",
            DropReason::NotOwner => "not_owner",
            DropReason::UnknownConference => "unknown_conference",
            DropReason::ConferenceFull => "conference_full",
            DropReason::NotConferencePeer => "not_conference_peer",
            DropReason::CollaboratorFailure => "collaborator_failure",
            DropReason::StaleConnection => "stale_connection",
        }
    }
}

impl From<HubError> for DropReason {
    fn from(err: HubError) -> Self {
        match err {
            HubError::ConferenceNotFound => DropReason::UnknownConference,
            HubError::ConferenceFull { .. } => DropReason::ConferenceFull,
            HubError::Forbidden(_) => DropReason::NotMember,
            HubError::NotFound(_) => DropReason::UnknownMessage,
            HubError::BadRequest(_) => DropReason::Invalid,
            HubError::InvalidToken(_)
            | HubError::Store(_)
            | HubError::Directory(_)
            | HubError::ShuttingDown
            | HubError::Internal(_) => DropReason::CollaboratorFailure,
        }
    }
}
