//! Error types for the longboard sync job.

use crate::models::BusinessId;

/// All errors that can occur while syncing Upwork data into Wave.
#[derive(Debug, thiserror::Error)]
pub enum LongboardError {
    /// HTTP transport failed.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A platform answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The GraphQL endpoint reported errors or returned no data.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The business selected for syncing does not exist.
    #[error("failed to find business with ID {0}")]
    BusinessNotFound(BusinessId),

    /// The source team list was absent or malformed.
    #[error("invalid team response from Upwork: {0}")]
    InvalidTeams(String),

    /// A source record is missing a field or carries an unparseable value.
    #[error("invalid record field `{field}`: {reason}")]
    Record {
        /// Column or JSON key that failed.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A platform backend failed outside of HTTP (lock poisoning,
    /// injected test failures).
    #[error("platform backend error: {0}")]
    Backend(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, LongboardError>;

impl LongboardError {
    /// Builds a [`LongboardError::Record`] error.
    #[inline]
    pub(crate) fn record<R: Into<String>>(field: &'static str, reason: R) -> Self {
        Self::Record {
            field,
            reason: reason.into(),
        }
    }
}
