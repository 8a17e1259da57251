//! Error types for the subscriber API client.
//!
//! # Design
//! A call fails in exactly one of four ways. `Encoding` means nothing was
//! sent. `Transport` means the executor never produced a response.
//! `Decoding` means a body did not have the expected shape. `Api` is the
//! service rejecting the request with its own `{code, message}` body, which
//! callers are expected to match on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::TransportError;

/// Error body returned by the service on any status >= 400.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

/// Errors returned by `Client` calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The request payload could not be serialized to JSON.
    #[error("error marshaling request body: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The executor failed before a response was received.
    #[error("error making request: {0}")]
    Transport(#[source] TransportError),

    /// A response body (success or error) did not match the expected shape.
    #[error("error decoding response: {0}")]
    Decoding(#[source] serde_json::Error),

    /// The service rejected the request.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn api_code(&self) -> Option<i64> {
        self.api_error().map(|err| err.code)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = ApiError {
            code: 123,
            message: "Error message".to_string(),
        };
        assert_eq!(err.to_string(), "123: Error message");
    }

    #[test]
    fn api_variant_is_transparent() {
        let err = Error::from(ApiError {
            code: 7225,
            message: "Invalid API key".to_string(),
        });
        assert_eq!(err.to_string(), "7225: Invalid API key");
        assert_eq!(err.api_code(), Some(7225));
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_variant_keeps_source() {
        let err = Error::Transport("connection refused".into());
        assert!(err.is_transport());
        assert_eq!(err.api_code(), None);
        assert_eq!(err.to_string(), "error making request: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn decoding_variant_message() {
        let source = serde_json::from_str::<ApiError>("not json").unwrap_err();
        let err = Error::Decoding(source);
        assert!(err.to_string().starts_with("error decoding response: "));
    }
}
