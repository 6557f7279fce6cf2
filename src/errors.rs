use thiserror::Error;

use crate::transfer::Phase;

/// Failures raised by the SQLite-backed store.
#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("database {0} does not accept writes")]
    ReadOnly(String),
}

impl GraphStoreError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::InvalidInput(msg.into())
    }

    pub fn read_only<T: Into<String>>(database: T) -> Self {
        GraphStoreError::ReadOnly(database.into())
    }
}

/// Terminal failure of a copy. Every variant aborts the whole transfer.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("unable to proceed: database {database} is {status}")]
    SourceUnavailable { database: String, status: String },
    #[error("unable to find database {0}")]
    DatabaseNotFound(String),
    #[error("unable to find source node with id {source_id}")]
    MissingIdentityMapping { source_id: i64 },
    #[error("writing {phase} batch {batch} failed: {reason}")]
    WriteFailure {
        phase: Phase,
        batch: usize,
        reason: String,
    },
    #[error("reading {phase} failed: {reason}")]
    ReadFailure { phase: Phase, reason: String },
    #[error("database {database} cannot be protected: {reason}")]
    GuardStateConflict { database: String, reason: String },
    #[error("invalid copy options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
}

impl CopyError {
    pub fn missing_mapping(source_id: i64) -> Self {
        CopyError::MissingIdentityMapping { source_id }
    }

    pub fn guard_conflict<D: Into<String>, R: Into<String>>(database: D, reason: R) -> Self {
        CopyError::GuardStateConflict {
            database: database.into(),
            reason: reason.into(),
        }
    }

    /// Attaches batch context to an error coming back from a writer. Mapping
    /// misses and already-contextualised failures pass through untouched.
    pub(crate) fn in_batch(self, phase: Phase, batch: usize) -> Self {
        match self {
            err @ (CopyError::MissingIdentityMapping { .. } | CopyError::WriteFailure { .. }) => {
                err
            }
            other => CopyError::WriteFailure {
                phase,
                batch,
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn while_reading(self, phase: Phase) -> Self {
        match self {
            err @ CopyError::ReadFailure { .. } => err,
            other => CopyError::ReadFailure {
                phase,
                reason: other.to_string(),
            },
        }
    }
}
