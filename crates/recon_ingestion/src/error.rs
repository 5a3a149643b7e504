use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Bank(#[from] recon_bank_client::BankError),
    #[error(transparent)]
    Store(#[from] recon_store::StoreError),
    #[error("statement row failed schema validation, quarantined: {0}")]
    Validation(String),
}

pub type IngestionResult<T> = Result<T, IngestionError>;
