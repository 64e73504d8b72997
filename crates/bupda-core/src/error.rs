use tracing::warn;

use crate::ledger::LedgerError;

pub const VENDOR_ERROR_PREFIX: &str = "graphql: ";
pub const LEDGER_UNAVAILABLE_MESSAGE: &str = "layanan BUPDA sedang tidak tersedia";

// `Internal` detail is logged, never shown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Upstream(_) => "upstream_failure",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn public_messages(&self) -> Vec<String> {
        match self {
            ServiceError::Internal(_) => vec!["internal server error".to_string()],
            other => vec![other.to_string()],
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(format!("{err:#}"))
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(message) => {
                ServiceError::Upstream(strip_vendor_prefix(&message).to_string())
            }
            LedgerError::Transport(_) | LedgerError::Decode(_) => {
                warn!(target: "ledger", "ledger call failed: {err}");
                ServiceError::Unavailable(LEDGER_UNAVAILABLE_MESSAGE.to_string())
            }
        }
    }
}

pub fn strip_vendor_prefix(message: &str) -> &str {
    message.strip_prefix(VENDOR_ERROR_PREFIX).unwrap_or(message)
}
