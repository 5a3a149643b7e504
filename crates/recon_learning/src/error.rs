use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("reviewed-suggestion source call failed: {0}")]
    Source(String),
    #[error(transparent)]
    Store(#[from] recon_store::StoreError),
    #[error(transparent)]
    Embed(#[from] recon_patterns::EmbedError),
    #[error(transparent)]
    Index(#[from] recon_patterns::IndexError),
}

pub type LearningResult<T> = Result<T, LearningError>;
