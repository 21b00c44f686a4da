//! Authentication Utilities for Exchange Backends
//!
//! Credentials plus the keyed-hash primitives shared by every signing
//! scheme. Secrets never leave this module except as MAC key material.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{digest::KeyInit, Hmac, Mac};
use md5::{Digest as _, Md5};
use sha2::{Sha256, Sha384, Sha512};

use crate::connectors::error::ConnectorError;

/// API credentials for exchange authentication
#[derive(Clone)]
pub struct ApiCredentials {
    /// API key (public identifier)
    pub api_key: String,
    /// API secret (for signing requests)
    pub api_secret: String,
    /// Passphrase (required by GDAX)
    pub passphrase: Option<String>,
    /// Customer/account id (required by Bitstamp)
    pub customer_id: Option<String>,
}

impl ApiCredentials {
    /// Create credentials with key and secret
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            passphrase: None,
            customer_id: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(passphrase.to_string());
        self
    }

    pub fn with_customer_id(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    /// Reject credentials that can never produce a valid signature.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.api_key.trim().is_empty() {
            return Err(ConnectorError::Configuration("API key is empty".to_string()));
        }
        if self.api_secret.is_empty() {
            return Err(ConnectorError::Configuration("API secret is missing".to_string()));
        }
        Ok(())
    }

    /// Secret decoded from base64, for backends that issue encoded secrets.
    pub fn decoded_secret(&self) -> Result<Vec<u8>, ConnectorError> {
        STANDARD.decode(self.api_secret.as_bytes()).map_err(|_| {
            ConnectorError::Configuration("API secret is not valid base64".to_string())
        })
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &format!("{}...", &self.api_key.chars().take(8).collect::<String>()))
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

/// Hash function used inside the HMAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

/// Text encoding of a computed digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    Hex,
    UpperHex,
    Base64,
}

impl DigestEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            DigestEncoding::Hex => hex::encode(bytes),
            DigestEncoding::UpperHex => hex::encode_upper(bytes),
            DigestEncoding::Base64 => STANDARD.encode(bytes),
        }
    }
}

/// Keyed hash of `message` under `key`.
pub fn hmac_digest(algorithm: HashAlgorithm, key: &[u8], message: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => keyed::<Hmac<Sha256>>(key, message),
        HashAlgorithm::Sha384 => keyed::<Hmac<Sha384>>(key, message),
        HashAlgorithm::Sha512 => keyed::<Hmac<Sha512>>(key, message),
    }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Sign a message using HMAC-SHA256 (used by Binance)
/// Returns hex-encoded signature
pub fn hmac_sha256_sign(secret: &str, message: &str) -> String {
    DigestEncoding::Hex.encode(&hmac_digest(
        HashAlgorithm::Sha256,
        secret.as_bytes(),
        message.as_bytes(),
    ))
}

/// Plain SHA-256 of a message
pub fn sha256(message: &[u8]) -> Vec<u8> {
    use sha2::Digest as _;
    Sha256::digest(message).to_vec()
}

/// Plain MD5 of a message
pub fn md5_digest(message: &[u8]) -> Vec<u8> {
    Md5::digest(message).to_vec()
}

/// Unix timestamp in seconds with millisecond fraction (used by GDAX)
pub fn timestamp_secs_frac() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis())
}

/// Build an `application/x-www-form-urlencoded` string from key-value pairs,
/// preserving order.
pub fn build_query_string<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

/// Percent-encode a single component (RFC 3986 unreserved set kept).
pub fn url_encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
