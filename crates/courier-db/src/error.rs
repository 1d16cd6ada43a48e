use thiserror::Error;

/// Typed failure surface of the storage layer. The api crate translates
/// these into `{ success: false, error_code }` responses; nothing else
/// crosses the service boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Replayed confirmation of a transaction already in a terminal state.
    #[error("transaction already settled")]
    AlreadyConfirmed,

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
