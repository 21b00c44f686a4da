//! Backend client: configuration, request paths and signing
//!
//! [`BackendClient`] knows a backend's base URL, API version and
//! credentials, and turns a [`Route`] into a [`SignedRequest`]. It performs
//! no I/O; requests are executed by a [`Transport`](super::transport::Transport).

use std::time::Duration;

use url::Url;

use crate::connectors::auth::ApiCredentials;
use crate::connectors::cex::{Backend, BackendSpec, Route};
use crate::connectors::error::ConnectorError;
use crate::connectors::nonce::NonceSource;
use crate::connectors::signing::{Envelope, SignContext};
use crate::connectors::transport::{Method, SignedRequest};

/// Default transport timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain-data client settings
#[derive(Clone, Default)]
pub struct ClientConfig {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub passphrase: Option<String>,
    pub customer_id: Option<String>,
    /// API version, defaults to the backend's
    pub version: Option<String>,
    /// Base URL override, defaults to the backend's
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Public-only configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn secret(mut self, secret: &str) -> Self {
        self.secret = Some(secret.to_string());
        self
    }

    pub fn passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(passphrase.to_string());
        self
    }

    pub fn customer_id(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `<PREFIX>_API_KEY`, `<PREFIX>_API_SECRET`, `<PREFIX>_API_PASSPHRASE`
    /// and `<PREFIX>_CUSTOMER_ID`, where the prefix is the uppercase backend
    /// name (e.g. `KRAKEN_API_KEY`). Unset variables stay unset.
    pub fn from_env(backend: Backend) -> Self {
        let prefix = backend.env_prefix();
        let var = |suffix: &str| {
            std::env::var(format!("{}_{}", prefix, suffix))
                .ok()
                .filter(|value| !value.is_empty())
        };
        Self {
            key: var("API_KEY"),
            secret: var("API_SECRET"),
            passphrase: var("API_PASSPHRASE"),
            customer_id: var("CUSTOMER_ID"),
            ..Self::default()
        }
    }

    /// Credentials, if any were configured. A key without a secret (or the
    /// reverse) is a configuration error.
    fn credentials(&self) -> Result<Option<ApiCredentials>, ConnectorError> {
        match (&self.key, &self.secret) {
            (None, None) => Ok(None),
            (Some(key), Some(secret)) => {
                let mut credentials = ApiCredentials::new(key, secret);
                credentials.passphrase = self.passphrase.clone();
                credentials.customer_id = self.customer_id.clone();
                Ok(Some(credentials))
            }
            (Some(_), None) => Err(ConnectorError::Configuration(
                "API key given without a secret".to_string(),
            )),
            (None, Some(_)) => Err(ConnectorError::Configuration(
                "API secret given without a key".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ClientConfig")
            .field("key", &self.key)
            .field("secret", &redacted(&self.secret))
            .field("passphrase", &redacted(&self.passphrase))
            .field("customer_id", &self.customer_id)
            .field("version", &self.version)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-backend request builder
#[derive(Debug)]
pub struct BackendClient {
    backend: Backend,
    base_url: String,
    version: String,
    timeout: Duration,
    credentials: Option<ApiCredentials>,
    nonce: NonceSource,
}

impl BackendClient {
    /// Validate `config` against the backend and build a client.
    pub fn new(backend: Backend, config: ClientConfig) -> Result<Self, ConnectorError> {
        let spec = backend.spec();

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| spec.base_url.to_string());
        let parsed = Url::parse(&base_url).map_err(|e| {
            ConnectorError::Configuration(format!("Invalid base URL '{}': {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConnectorError::Configuration(format!(
                "Base URL '{}' must be http(s)",
                base_url
            )));
        }

        let credentials = config.credentials()?;
        if let Some(credentials) = &credentials {
            spec.scheme.validate(credentials)?;
        }

        Ok(Self {
            backend,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: config
                .version
                .unwrap_or_else(|| spec.default_version.to_string()),
            timeout: config.timeout.unwrap_or(DEFAULT_TIMEOUT),
            credentials,
            nonce: NonceSource::new(spec.nonce_unit),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn spec(&self) -> &'static BackendSpec {
        self.backend.spec()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Versioned request path for `endpoint`.
    pub fn uri(&self, endpoint: &str) -> String {
        (self.spec().uri)(&self.version, endpoint)
    }

    /// Build the request for `route`. Private requests are signed; public
    /// ones bypass signing entirely.
    pub fn build(&self, route: Route, private: bool) -> Result<SignedRequest, ConnectorError> {
        let method = self.method_for(&route, private);
        let uri = self.uri(&route.endpoint);

        if !private {
            return Ok(Envelope::unsigned(
                method,
                format!("{}{}", self.base_url, uri),
                &route.params,
            ));
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ConnectorError::Configuration(format!(
                "{} requires API credentials for private operations",
                self.backend
            ))
        })?;
        self.spec().scheme.sign(SignContext {
            method,
            base_url: &self.base_url,
            uri: &uri,
            params: route.params,
            credentials,
            nonce: &self.nonce,
        })
    }

    /// Verb a route would be sent with.
    pub fn method_for(&self, route: &Route, private: bool) -> Method {
        route.method.unwrap_or(if private {
            self.spec().private_method
        } else {
            self.spec().public_method
        })
    }
}
