//! Status engine error types.

use thiserror::Error;

/// Errors that abort a whole status query.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("pattern {pattern:?} {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("state store error: {0}")]
    State(#[from] fleet_state::StateError),

    /// A broken invariant in the data read from the state store.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

pub type StatusResult<T> = Result<T, StatusError>;
