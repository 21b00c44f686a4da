//! Connector Error Types
//!
//! Unified error handling for all exchange backends. Validation errors
//! (configuration, pair, endpoint) are raised before any network call;
//! request errors are raised after the transport returns.

use thiserror::Error;

/// Maximum number of body characters rendered in `Display` output.
const BODY_PREVIEW: usize = 200;

/// Errors that can occur when interacting with an exchange backend
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    /// Missing or invalid credentials, base URL or other client settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pair is not in the backend's supported pair set
    #[error("{pair} is not supported by {backend}")]
    UnsupportedPair { backend: String, pair: String },

    /// Operation is not available under the configured API version
    #[error("{operation} is unavailable on {backend}: {reason}")]
    UnsupportedEndpoint {
        backend: String,
        operation: String,
        reason: String,
    },

    /// Operation is not implemented by this backend
    #[error("{operation} is not implemented by {backend}")]
    NotImplemented { backend: String, operation: String },

    /// Invalid request parameters supplied by the caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Non-success HTTP status or a backend-reported application failure
    #[error("{backend} rejected {operation} [{status}]: {message} - Body: {}", preview(.body))]
    Request {
        backend: String,
        operation: String,
        status: u16,
        message: String,
        body: String,
    },

    /// Response body could not be decoded into the expected shape
    #[error("Failed to decode {backend} {operation} response: {message} - Body: {}", preview(.body))]
    Decode {
        backend: String,
        operation: String,
        message: String,
        body: String,
    },

    /// Network-related errors (connection failed, TLS, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out in the transport
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ConnectorError {
    /// True for every "the exchange call failed" outcome, decoding included.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::Request { .. }
                | ConnectorError::Decode { .. }
                | ConnectorError::Network(_)
                | ConnectorError::Timeout(_)
        )
    }

    /// True when the operation cannot be served by this backend/version.
    pub fn is_unsupported_endpoint(&self) -> bool {
        matches!(
            self,
            ConnectorError::UnsupportedEndpoint { .. } | ConnectorError::NotImplemented { .. }
        )
    }

    /// Raw response body attached to request and decode errors.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            ConnectorError::Request { body, .. } | ConnectorError::Decode { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectorError::Timeout(err.to_string())
        } else if err.is_connect() {
            ConnectorError::Network(format!("Connection failed: {}", err))
        } else {
            ConnectorError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_display_truncates_body() {
        let err = ConnectorError::Request {
            backend: "Kraken".to_string(),
            operation: "wallet".to_string(),
            status: 500,
            message: "Internal Server Error".to_string(),
            body: "x".repeat(500),
        };
        let text = err.to_string();
        assert!(text.starts_with("Kraken rejected wallet [500]: Internal Server Error"));
        assert_eq!(text.matches('x').count(), BODY_PREVIEW);
        assert_eq!(err.raw_body().map(str::len), Some(500));
    }

    #[test]
    fn test_error_categories() {
        let decode = ConnectorError::Decode {
            backend: "Binance".to_string(),
            operation: "ticker".to_string(),
            message: "expected value".to_string(),
            body: "<html>".to_string(),
        };
        assert!(decode.is_request_error());
        assert!(!decode.is_unsupported_endpoint());

        let missing = ConnectorError::NotImplemented {
            backend: "Poloniex".to_string(),
            operation: "bid".to_string(),
        };
        assert!(missing.is_unsupported_endpoint());
        assert_eq!(missing.to_string(), "bid is not implemented by Poloniex");

        let pair = ConnectorError::UnsupportedPair {
            backend: "HitBTC".to_string(),
            pair: "DOGEUSD".to_string(),
        };
        assert!(!pair.is_request_error());
        assert_eq!(pair.to_string(), "DOGEUSD is not supported by HitBTC");
    }
}
