//! HTTP transport seam
//!
//! The core never performs network I/O itself: it hands a fully built
//! [`SignedRequest`] to a [`Transport`] and receives the status and body.
//! Retries, redirects and pooling belong to the transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::connectors::error::ConnectorError;

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to send. Consumed exactly once by the transport; a retry
/// must go through signing again so the nonce is fresh.
#[derive(Debug, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Whether the request carries authentication material
    pub signed: bool,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Query parameters decoded from the URL.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self.url.split_once('?') {
            Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Form fields decoded from an urlencoded body.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        match &self.body {
            Some(body) => url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Status and body returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs HTTP exchanges on behalf of the exchange interfaces
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: SignedRequest) -> Result<RawResponse, ConnectorError>;
}

/// Default transport over a shared `reqwest::Client`
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: SignedRequest) -> Result<RawResponse, ConnectorError> {
        if request.signed {
            debug!("{} {} (signed)", request.method, request.url);
        } else {
            debug!("{} {}", request.method, request.url);
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_request_accessors() {
        let request = SignedRequest {
            method: Method::Post,
            url: "https://api.example.com/v1/order?symbol=BTCUSD&limit=5".to_string(),
            headers: vec![("X-Key".to_string(), "abc".to_string())],
            body: Some("price=1.5&amount=2".to_string()),
            signed: true,
        };

        assert_eq!(request.header("x-key"), Some("abc"));
        assert_eq!(request.header("missing"), None);
        assert_eq!(
            request.query_pairs(),
            vec![
                ("symbol".to_string(), "BTCUSD".to_string()),
                ("limit".to_string(), "5".to_string())
            ]
        );
        assert_eq!(request.form_pairs().len(), 2);
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "{}").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(302, "").is_success());
        assert!(!RawResponse::new(429, "").is_success());
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
