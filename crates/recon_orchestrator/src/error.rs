use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Gl(#[from] recon_gl_cache::GlFetchError),
    #[error(transparent)]
    Store(#[from] recon_store::StoreError),
    #[error(transparent)]
    Embed(#[from] recon_patterns::EmbedError),
    #[error(transparent)]
    Index(#[from] recon_patterns::IndexError),
    #[error(transparent)]
    Sink(#[from] crate::emit::SinkError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
