//! Error types for the medicine cabinet Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the medicine cabinet Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The completion API answered with a non-success status
    #[error("Completion API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Transport failure talking to the completion API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The completion API answered but produced no text
    #[error("Completion contained no text")]
    EmptyCompletion,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Serialization(_) => 400,
            Error::Upstream { .. } | Error::Http(_) | Error::EmptyCompletion => 502,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("bad".into()).status_code(), 400);
        assert_eq!(Error::EmptyCompletion.status_code(), 502);
        assert_eq!(
            Error::Upstream { status: 429, body: String::new() }.status_code(),
            502
        );
        assert_eq!(Error::Config("missing".into()).status_code(), 500);
    }

    #[test]
    fn test_upstream_message() {
        let err = Error::Upstream { status: 401, body: "invalid key".into() };
        assert_eq!(err.to_string(), "Completion API returned 401: invalid key");
    }
}
