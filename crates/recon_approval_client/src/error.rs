use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalClientError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("approval service HTTP client middleware error: {0}")]
    Middleware(String),
    #[error("approval service returned status {status} for {operation}: {body}")]
    BadStatus { operation: &'static str, status: StatusCode, body: String },
    #[error("approval service response did not match the expected schema: {0}")]
    Validation(String),
}

impl ApprovalClientError {
    /// A 409 on a write with a natural idempotency key (`wise_transaction_id`, pattern
    /// uniqueness tuple) is a `DuplicateSubmission`, not a failure (§7).
    pub fn is_duplicate_submission(&self) -> bool {
        matches!(self, ApprovalClientError::BadStatus { status, .. } if *status == StatusCode::CONFLICT)
    }
}

impl From<reqwest_middleware::Error> for ApprovalClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => ApprovalClientError::Request(e),
            reqwest_middleware::Error::Middleware(e) => ApprovalClientError::Middleware(e.to_string()),
        }
    }
}

pub type ApprovalClientResult<T> = Result<T, ApprovalClientError>;
