//! Error types for the fleet state store.

use thiserror::Error;

use crate::charm::CharmUrlError;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("machine {0} is not provisioned")]
    NotProvisioned(String),

    #[error("unit {0} is not assigned to a machine")]
    NotAssigned(String),

    #[error("relation error: {0}")]
    Relation(String),

    #[error(transparent)]
    CharmUrl(#[from] CharmUrlError),
}

impl StateError {
    /// True for lookups of records that legitimately may not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }

    pub fn is_not_provisioned(&self) -> bool {
        matches!(self, StateError::NotProvisioned(_))
    }
}
