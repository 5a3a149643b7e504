use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bank client is missing a bearer token or signing key")]
    AuthRequired,
    #[error("failed to sign the SCA one-time token: {0}")]
    SigningFailed(String),
    #[error("requested statement window exceeds the 469-day bank API limit")]
    RangeTooLarge,
    #[error(transparent)]
    Transient(#[from] reqwest::Error),
    #[error("bank API returned a non-retryable error: {status} {body}")]
    Fatal { status: StatusCode, body: String },
    #[error("bank API response did not match the expected schema: {0}")]
    Validation(String),
    #[error("bank HTTP client middleware error: {0}")]
    Middleware(String),
}

impl BankError {
    /// Whether the retry helper (§7) should back off and retry this error, as opposed to
    /// surfacing it immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, BankError::Transient(_))
    }
}

impl From<reqwest_middleware::Error> for BankError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => BankError::Transient(e),
            reqwest_middleware::Error::Middleware(e) => BankError::Middleware(e.to_string()),
        }
    }
}

pub type BankResult<T> = Result<T, BankError>;
