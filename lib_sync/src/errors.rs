//! Error taxonomy of the sync engine.
//!
//! Page fetch failures (`Transport`, `Decode`) abort a whole cycle. Anything
//! raised while reconciling or writing a single record is logged with the
//! company name and the cycle moves on to the next record.

use thiserror::Error;

use crate::retrieve::ky_http::HttpError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The request did not complete (connect, timeout, reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response arrived but its body is not what the engine expects.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The remote answered, but with a non-success HTTP status or application code.
    #[error("Application error (status {status}, code {code}): {message}")]
    Application {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A log entry arrived for a company that has no destination row yet.
    #[error("No destination row for company '{0}'")]
    RowMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Wraps a non-2xx HTTP answer.
    pub fn http_status(status: u16, body: Option<String>) -> Self {
        SyncError::Application {
            status,
            code: -1,
            message: body.unwrap_or_default(),
        }
    }
}

impl From<HttpError> for SyncError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Decode { .. } => SyncError::Decode(err.to_string()),
            HttpError::Url(_) | HttpError::Build(_) => SyncError::Config(err.to_string()),
            HttpError::Transport(_) | HttpError::Encode(_) => SyncError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_decode_maps_to_decode() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err: SyncError = HttpError::Decode { status: 200, source }.into();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[test]
    fn test_http_status_is_application_error() {
        let err = SyncError::http_status(502, Some("bad gateway".into()));
        assert_eq!(
            err.to_string(),
            "Application error (status 502, code -1): bad gateway"
        );
    }
}
