use thiserror::Error;

use bizmatch_shared::{PolicyError, ValidationError};
use bizmatch_store::StoreError;

/// Failure reported by a [`Backend`](crate::backend::Backend) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request never reached the service or the response was lost.
    #[error("Network error: {0}")]
    Network(String),

    /// The credential is expired, invalid or cannot be refreshed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A single-row fetch matched nothing.
    #[error("No rows returned")]
    NoRows,

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other application-level refusal.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl BackendError {
    /// Classify a raw failure the way a hosted REST backend reports it.
    /// `status` is `None` when no HTTP response was received.
    pub fn from_response(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            None => BackendError::Network(message),
            Some(_) if message.contains("Failed to fetch") => BackendError::Network(message),
            Some(401) => BackendError::Unauthorized(message),
            Some(_) if message.contains("JWT") => BackendError::Unauthorized(message),
            Some(400) if message.contains("refresh_token_not_found") => {
                BackendError::Unauthorized(message)
            }
            Some(406) => BackendError::NoRows,
            Some(409) => BackendError::Conflict(message),
            Some(status) => BackendError::Rejected { status, message },
        }
    }

    /// Worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status: 403,
            message: message.into(),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => BackendError::NoRows,
            StoreError::Conflict(msg) => BackendError::Conflict(msg),
            mismatch @ StoreError::ConnectionMismatch => BackendError::Rejected {
                status: 400,
                message: mismatch.to_string(),
            },
            other => BackendError::Rejected {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Error returned by every client operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Input rejected before any remote call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The connection policy forbids the action.
    #[error("{0}")]
    Policy(#[from] PolicyError),

    #[error("Backend error: {0}")]
    Backend(BackendError),

    /// The session expired; the user has been signed out.
    #[error("Your session has expired, please sign in again")]
    SessionExpired,

    #[error("You must be signed in")]
    NotAuthenticated,

    /// The same action for the same target is already in flight.
    #[error("This request is already in progress")]
    DuplicateRequest,

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<BackendError> for ClientError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unauthorized(_) => ClientError::SessionExpired,
            other => ClientError::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
