//! Error taxonomy surfaced by the synchronization engine.
//!
//! Stale results are not an error: a discarded outcome is represented only
//! by the absence of a state update (see [`Disposition::Stale`]).
//!
//! [`Disposition::Stale`]: crate::sync::reducer::Disposition::Stale

use serde::Serialize;
use thiserror::Error;

/// Errors that can end up in [`ObservableState::error`].
///
/// The type is `Clone` because it lives inside observable state that is
/// handed to every observer.
///
/// [`ObservableState::error`]: crate::sync::state::ObservableState::error
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SyncError {
    /// The request is incomplete; nothing was attempted.
    #[error("Missing parameters: {0}")]
    MissingParameters(String),

    /// No provider, wallet or runtime is present to serve the request.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The external call was attempted and rejected.
    #[error("Remote call failed: {0}")]
    RemoteFailure(String),

    /// A referenced entity (block, transaction) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Discriminant of [`SyncError`], for call sites that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingParameters,
    CollaboratorUnavailable,
    RemoteFailure,
    NotFound,
}

impl SyncError {
    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::MissingParameters(_) => ErrorKind::MissingParameters,
            SyncError::CollaboratorUnavailable(_) => ErrorKind::CollaboratorUnavailable,
            SyncError::RemoteFailure(_) => ErrorKind::RemoteFailure,
            SyncError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::MissingParameters => "missing_parameters",
            ErrorKind::CollaboratorUnavailable => "collaborator_unavailable",
            ErrorKind::RemoteFailure => "remote_failure",
            ErrorKind::NotFound => "not_found",
        }
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
