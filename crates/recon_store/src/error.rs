use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no row found for key {0}")]
    NotFound(String),
    #[error("lease conflict: {0}")]
    LeaseConflict(String),
    #[error("cursor for {0} is already syncing")]
    AlreadySyncing(String),
    #[error("uniqueness violation on {0}")]
    UniqueViolation(String),
    #[error("backing store unavailable: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
