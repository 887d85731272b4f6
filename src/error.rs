// Top-level error taxonomy
// Fatal paths surface a single human-readable message; recoverable parse
// failures are absorbed by the batch classifier and aggregator before they
// ever reach this type.

use thiserror::Error;

use crate::services::detection::json_extract::ParseFailure;
use crate::services::providers::OracleError;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any oracle call; the user can correct and resubmit.
    #[error("{0}")]
    InvalidInput(String),

    /// Oracle returned HTTP 429. Surfaced verbatim, never retried locally.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Oracle returned HTTP 402. Requires operator action.
    #[error("AI credits depleted. Please add credits to continue.")]
    QuotaExhausted,

    /// Any other transport-level failure.
    #[error("AI service unavailable: {0}")]
    OracleUnavailable(String),

    /// Oracle output contained no usable JSON at a call site with no fallback.
    #[error("unable to parse oracle response: {0}")]
    ParseFailure(String),
}

impl From<OracleError> for Error {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::RateLimited => Error::RateLimited,
            OracleError::QuotaExhausted => Error::QuotaExhausted,
            other => Error::OracleUnavailable(other.to_string()),
        }
    }
}

impl From<ParseFailure> for Error {
    fn from(err: ParseFailure) -> Self {
        Error::ParseFailure(err.to_string())
    }
}

impl Error {
    /// Rate and quota errors are externally imposed resource limits; they
    /// abort multi-step flows instead of degrading to a fallback.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Error::RateLimited | Error::QuotaExhausted)
    }
}
