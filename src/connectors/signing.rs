//! Request signing strategies
//!
//! Every backend authenticates with a keyed hash; they differ in how the
//! message is canonicalized, which hash is used and where the key id and
//! signature are placed. [`SignScheme`] enumerates those variants and
//! [`Envelope`] is the shared builder that turns the computed digest into
//! a [`SignedRequest`].

use serde_json::{Map, Value};

use crate::connectors::auth::{
    build_query_string, hmac_digest, md5_digest, sha256, timestamp_secs_frac, url_encode,
    ApiCredentials, DigestEncoding, HashAlgorithm,
};
use crate::connectors::error::ConnectorError;
use crate::connectors::nonce::NonceSource;
use crate::connectors::transport::{Method, SignedRequest};

/// Inputs for signing one request
pub struct SignContext<'a> {
    pub method: Method,
    /// Scheme and host, without trailing slash
    pub base_url: &'a str,
    /// Versioned request path, e.g. `/api/v3/order`
    pub uri: &'a str,
    pub params: Vec<(String, String)>,
    pub credentials: &'a ApiCredentials,
    pub nonce: &'a NonceSource,
}

impl SignContext<'_> {
    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.uri)
    }
}

/// Hash function plus output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacSpec {
    pub algorithm: HashAlgorithm,
    pub encoding: DigestEncoding,
}

impl MacSpec {
    pub const fn new(algorithm: HashAlgorithm, encoding: DigestEncoding) -> Self {
        Self { algorithm, encoding }
    }

    pub fn sign(&self, key: &[u8], message: &[u8]) -> String {
        self.encoding.encode(&hmac_digest(self.algorithm, key, message))
    }
}

/// How a backend authenticates private requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignScheme {
    /// Timestamp appended to the params, MAC over the urlencoded params
    /// appended as another param; key id in a header (Binance).
    QueryParam {
        mac: MacSpec,
        key_header: &'static str,
        timestamp_param: &'static str,
        signature_param: &'static str,
    },
    /// Key id and nonce appended to the query string, MAC over the full URL
    /// (or the path and query only) sent in a header (Bittrex, HitBTC).
    SignedUri {
        mac: MacSpec,
        key_param: &'static str,
        nonce_param: &'static str,
        signature_header: &'static str,
        sign_full_url: bool,
    },
    /// Nonce added to the form body, MAC over the body; key id and
    /// signature in headers (Poloniex).
    FormBody {
        mac: MacSpec,
        key_header: &'static str,
        signature_header: &'static str,
    },
    /// MAC over `uri + SHA256(nonce + body)` keyed with the base64-decoded
    /// secret (Kraken).
    PathDigest {
        key_header: &'static str,
        signature_header: &'static str,
    },
    /// JSON payload carrying path and nonce, base64-encoded into a header
    /// and signed (Bitfinex v1, Gemini). Params named in `integer_params`
    /// are sent as JSON integers, everything else as strings.
    EncodedPayload {
        mac: MacSpec,
        header_prefix: &'static str,
        send_body: bool,
        integer_params: &'static [&'static str],
    },
    /// MAC over `timestamp + METHOD + path + body` keyed with the
    /// base64-decoded secret, passphrase header (GDAX).
    Prehash { header_prefix: &'static str },
    /// MAC over `nonce + customer_id + key`, all in the form body (Bitstamp).
    CustomerNonce,
    /// Plain MD5 over sorted params plus the secret (OKCoin, OKEX v1).
    SortedMd5,
    /// `amx key:signature:nonce` authorization header (Cryptopia).
    Amx,
}

impl SignScheme {
    /// Check the credentials carry everything this scheme needs.
    pub fn validate(&self, credentials: &ApiCredentials) -> Result<(), ConnectorError> {
        credentials.validate()?;
        match self {
            SignScheme::PathDigest { .. } | SignScheme::Amx => {
                credentials.decoded_secret()?;
            }
            SignScheme::Prehash { .. } => {
                credentials.decoded_secret()?;
                if credentials.passphrase.as_deref().map_or(true, str::is_empty) {
                    return Err(ConnectorError::Configuration(
                        "Passphrase is required".to_string(),
                    ));
                }
            }
            SignScheme::CustomerNonce => {
                if credentials.customer_id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConnectorError::Configuration(
                        "Customer id is required".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Build the authenticated request. Never performs I/O.
    pub fn sign(&self, ctx: SignContext<'_>) -> Result<SignedRequest, ConnectorError> {
        let creds = ctx.credentials;
        let secret = creds.api_secret.as_bytes();

        match *self {
            SignScheme::QueryParam {
                mac,
                key_header,
                timestamp_param,
                signature_param,
            } => {
                let mut params = ctx.params.clone();
                params.push((timestamp_param.to_string(), ctx.nonce.next().to_string()));
                let signature = mac.sign(secret, build_query_string(&params).as_bytes());
                params.push((signature_param.to_string(), signature));

                let envelope = Envelope::new(ctx.method, ctx.url()).header(key_header, &creds.api_key);
                Ok(match ctx.method {
                    Method::Post => envelope.form(&params),
                    _ => envelope.query(&params),
                }
                .finish())
            }

            SignScheme::SignedUri {
                mac,
                key_param,
                nonce_param,
                signature_header,
                sign_full_url,
            } => {
                let mut params = ctx.params.clone();
                params.push((key_param.to_string(), creds.api_key.clone()));
                params.push((nonce_param.to_string(), ctx.nonce.next().to_string()));
                let path = format!("{}?{}", ctx.uri, build_query_string(&params));
                let url = format!("{}{}", ctx.base_url, path);
                let message = if sign_full_url { &url } else { &path };
                let signature = mac.sign(secret, message.as_bytes());

                Ok(Envelope::new(ctx.method, url)
                    .header(signature_header, &signature)
                    .finish())
            }

            SignScheme::FormBody {
                mac,
                key_header,
                signature_header,
            } => {
                let mut params = ctx.params.clone();
                params.push(("nonce".to_string(), ctx.nonce.next().to_string()));
                let body = build_query_string(&params);
                let signature = mac.sign(secret, body.as_bytes());

                Ok(Envelope::new(Method::Post, ctx.url())
                    .header(key_header, &creds.api_key)
                    .header(signature_header, &signature)
                    .form(&params)
                    .finish())
            }

            SignScheme::PathDigest {
                key_header,
                signature_header,
            } => {
                let nonce = ctx.nonce.next().to_string();
                let mut params = ctx.params.clone();
                params.insert(0, ("nonce".to_string(), nonce.clone()));
                let body = build_query_string(&params);

                let mut message = ctx.uri.as_bytes().to_vec();
                message.extend(sha256(format!("{}{}", nonce, body).as_bytes()));
                let key = creds.decoded_secret()?;
                let signature = MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Base64)
                    .sign(&key, &message);

                Ok(Envelope::new(Method::Post, ctx.url())
                    .header(key_header, &creds.api_key)
                    .header(signature_header, &signature)
                    .form(&params)
                    .finish())
            }

            SignScheme::EncodedPayload {
                mac,
                header_prefix,
                send_body,
                integer_params,
            } => {
                let mut payload = Map::new();
                payload.insert("request".to_string(), Value::String(ctx.uri.to_string()));
                payload.insert("nonce".to_string(), Value::String(ctx.nonce.next().to_string()));
                for (key, value) in &ctx.params {
                    let typed = match value.parse::<i64>() {
                        Ok(number) if integer_params.contains(&key.as_str()) => Value::from(number),
                        _ => Value::String(value.clone()),
                    };
                    payload.insert(key.clone(), typed);
                }
                let json = Value::Object(payload).to_string();
                let encoded = DigestEncoding::Base64.encode(json.as_bytes());
                let signature = mac.sign(secret, encoded.as_bytes());

                let envelope = Envelope::new(Method::Post, ctx.url())
                    .header(&format!("{}-APIKEY", header_prefix), &creds.api_key)
                    .header(&format!("{}-PAYLOAD", header_prefix), &encoded)
                    .header(&format!("{}-SIGNATURE", header_prefix), &signature);
                Ok(if send_body {
                    envelope.json(json)
                } else {
                    envelope
                }
                .finish())
            }

            SignScheme::Prehash { header_prefix } => {
                let timestamp = timestamp_secs_frac();
                let (path, body) = match ctx.method {
                    Method::Post => (ctx.uri.to_string(), params_json(&ctx.params)),
                    _ if ctx.params.is_empty() => (ctx.uri.to_string(), String::new()),
                    _ => (
                        format!("{}?{}", ctx.uri, build_query_string(&ctx.params)),
                        String::new(),
                    ),
                };
                let message = format!("{}{}{}{}", timestamp, ctx.method, path, body);
                let key = creds.decoded_secret()?;
                let signature =
                    MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::Base64).sign(&key, message.as_bytes());
                let passphrase = creds.passphrase.as_deref().unwrap_or_default();

                let envelope = Envelope::new(ctx.method, format!("{}{}", ctx.base_url, path))
                    .header(&format!("{}-KEY", header_prefix), &creds.api_key)
                    .header(&format!("{}-SIGN", header_prefix), &signature)
                    .header(&format!("{}-TIMESTAMP", header_prefix), &timestamp)
                    .header(&format!("{}-PASSPHRASE", header_prefix), passphrase);
                Ok(if body.is_empty() {
                    envelope
                } else {
                    envelope.json(body)
                }
                .finish())
            }

            SignScheme::CustomerNonce => {
                let nonce = ctx.nonce.next().to_string();
                let customer_id = creds.customer_id.as_deref().unwrap_or_default();
                let message = format!("{}{}{}", nonce, customer_id, creds.api_key);
                let signature = MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::UpperHex)
                    .sign(secret, message.as_bytes());

                let mut params = ctx.params.clone();
                params.push(("key".to_string(), creds.api_key.clone()));
                params.push(("signature".to_string(), signature));
                params.push(("nonce".to_string(), nonce));

                Ok(Envelope::new(Method::Post, ctx.url()).form(&params).finish())
            }

            SignScheme::SortedMd5 => {
                let mut params = ctx.params.clone();
                params.push(("api_key".to_string(), creds.api_key.clone()));
                params.sort_by(|a, b| a.0.cmp(&b.0));
                let message = format!("{}&secret_key={}", build_query_string(&params), creds.api_secret);
                let signature = DigestEncoding::UpperHex.encode(&md5_digest(message.as_bytes()));
                params.push(("sign".to_string(), signature));

                Ok(Envelope::new(Method::Post, ctx.url()).form(&params).finish())
            }

            SignScheme::Amx => {
                let nonce = ctx.nonce.next().to_string();
                let url = ctx.url();
                let body = params_json(&ctx.params);
                let content = DigestEncoding::Base64.encode(&md5_digest(body.as_bytes()));
                let message = format!(
                    "{}POST{}{}{}",
                    creds.api_key,
                    url_encode(&url.to_lowercase()).to_lowercase(),
                    nonce,
                    content
                );
                let key = creds.decoded_secret()?;
                let signature =
                    MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::Base64).sign(&key, message.as_bytes());

                Ok(Envelope::new(Method::Post, url)
                    .header(
                        "Authorization",
                        &format!("amx {}:{}:{}", creds.api_key, signature, nonce),
                    )
                    .json(body)
                    .finish())
            }
        }
    }
}

fn params_json(params: &[(String, String)]) -> String {
    let map: Map<String, Value> = params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(map).to_string()
}

/// Builder for the final request, shared by signed and unsigned paths
#[derive(Debug)]
pub struct Envelope {
    method: Method,
    url: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Envelope {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, params: &[(String, String)]) -> Self {
        if !params.is_empty() {
            self.query = Some(build_query_string(params));
        }
        self
    }

    pub fn form(self, params: &[(String, String)]) -> Self {
        let mut envelope = self.header("Content-Type", "application/x-www-form-urlencoded");
        envelope.body = Some(build_query_string(params));
        envelope
    }

    pub fn json(self, body: String) -> Self {
        let mut envelope = self.header("Content-Type", "application/json");
        envelope.body = Some(body);
        envelope
    }

    /// Unsigned request: GET/DELETE params in the query, POST params in the body.
    pub fn unsigned(method: Method, url: String, params: &[(String, String)]) -> SignedRequest {
        let envelope = Envelope::new(method, url);
        let envelope = match method {
            Method::Post if !params.is_empty() => envelope.form(params),
            Method::Post => envelope,
            _ => envelope.query(params),
        };
        SignedRequest {
            signed: false,
            ..envelope.finish()
        }
    }

    pub fn finish(self) -> SignedRequest {
        let url = match self.query {
            Some(query) => format!("{}?{}", self.url, query),
            None => self.url,
        };
        SignedRequest {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            signed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::nonce::NonceUnit;

    const SECRET: &str = "c2VjcmV0LWtleS1tYXRlcmlhbA==";

    fn params() -> Vec<(String, String)> {
        vec![
            ("pair".to_string(), "XXBTZUSD".to_string()),
            ("price".to_string(), "100.5".to_string()),
        ]
    }

    fn sign(scheme: SignScheme, method: Method, creds: &ApiCredentials) -> SignedRequest {
        let nonce = NonceSource::new(NonceUnit::Millis);
        scheme
            .sign(SignContext {
                method,
                base_url: "https://api.example.com",
                uri: "/v1/private/order",
                params: params(),
                credentials: creds,
                nonce: &nonce,
            })
            .expect("signing should succeed")
    }

    fn all_schemes() -> Vec<SignScheme> {
        let hex512 = MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Hex);
        vec![
            SignScheme::QueryParam {
                mac: MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::Hex),
                key_header: "X-MBX-APIKEY",
                timestamp_param: "timestamp",
                signature_param: "signature",
            },
            SignScheme::SignedUri {
                mac: hex512,
                key_param: "apikey",
                nonce_param: "nonce",
                signature_header: "apisign",
                sign_full_url: true,
            },
            SignScheme::FormBody {
                mac: hex512,
                key_header: "Key",
                signature_header: "Sign",
            },
            SignScheme::PathDigest {
                key_header: "API-Key",
                signature_header: "API-Sign",
            },
            SignScheme::EncodedPayload {
                mac: MacSpec::new(HashAlgorithm::Sha384, DigestEncoding::Hex),
                header_prefix: "X-BFX",
                send_body: true,
                integer_params: &["order_id"],
            },
            SignScheme::Prehash { header_prefix: "CB-ACCESS" },
            SignScheme::CustomerNonce,
            SignScheme::SortedMd5,
            SignScheme::Amx,
        ]
    }

    fn full_credentials() -> ApiCredentials {
        ApiCredentials::new("public-key", SECRET)
            .with_passphrase("pass")
            .with_customer_id("12345")
    }

    #[test]
    fn test_signed_requests_never_contain_raw_secret() {
        let creds = full_credentials();
        for scheme in all_schemes() {
            let request = sign(scheme, Method::Post, &creds);
            let rendered = format!("{:?}", request);
            assert!(request.signed);
            assert!(!rendered.contains(SECRET), "{:?} leaked the secret", scheme);
            assert!(!rendered.contains("secret-key-material"));
        }
    }

    #[test]
    fn test_query_param_signature_matches_manual_hmac() {
        let creds = ApiCredentials::new("public-key", "plain-secret");
        let scheme = all_schemes()[0];
        let request = sign(scheme, Method::Get, &creds);

        assert_eq!(request.header("X-MBX-APIKEY"), Some("public-key"));
        let pairs = request.query_pairs();
        let (signature_pair, signed) = pairs.split_last().expect("query should not be empty");
        assert_eq!(signature_pair.0, "signature");
        assert_eq!(signed[2].0, "timestamp");
        let expected = crate::connectors::auth::hmac_sha256_sign(
            "plain-secret",
            &build_query_string(signed),
        );
        assert_eq!(signature_pair.1, expected);
    }

    #[test]
    fn test_signed_uri_places_key_and_nonce_in_query() {
        let creds = ApiCredentials::new("public-key", "plain-secret");
        let request = sign(all_schemes()[1], Method::Get, &creds);

        assert!(request.url.starts_with("https://api.example.com/v1/private/order?"));
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("apikey".to_string(), "public-key".to_string())));
        assert!(pairs.iter().any(|(k, _)| k == "nonce"));
        let expected = MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Hex)
            .sign(b"plain-secret", request.url.as_bytes());
        assert_eq!(request.header("apisign"), Some(expected.as_str()));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_path_digest_signature() {
        let creds = full_credentials();
        let request = sign(all_schemes()[3], Method::Post, &creds);

        let form = request.form_pairs();
        assert_eq!(form[0].0, "nonce");
        let nonce = &form[0].1;
        let body = request.body.clone().expect("body should be set");

        let mut message = b"/v1/private/order".to_vec();
        message.extend(sha256(format!("{}{}", nonce, body).as_bytes()));
        let expected = MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Base64)
            .sign(b"secret-key-material", &message);
        assert_eq!(request.header("API-Sign"), Some(expected.as_str()));
        assert_eq!(request.header("API-Key"), Some("public-key"));
    }

    #[test]
    fn test_encoded_payload_headers() {
        let creds = ApiCredentials::new("public-key", "plain-secret");
        let request = sign(all_schemes()[4], Method::Post, &creds);

        let payload = request.header("X-BFX-PAYLOAD").expect("payload header");
        let decoded = {
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            STANDARD.decode(payload).expect("payload should be base64")
        };
        let json: Value = serde_json::from_slice(&decoded).expect("payload should be JSON");
        assert_eq!(json["request"], "/v1/private/order");
        assert_eq!(json["pair"], "XXBTZUSD");
        assert!(json["nonce"].is_string());

        let expected = MacSpec::new(HashAlgorithm::Sha384, DigestEncoding::Hex)
            .sign(b"plain-secret", payload.as_bytes());
        assert_eq!(request.header("X-BFX-SIGNATURE"), Some(expected.as_str()));
    }

    #[test]
    fn test_encoded_payload_integer_params() {
        let creds = ApiCredentials::new("public-key", "plain-secret");
        let nonce = NonceSource::new(NonceUnit::Millis);
        let request = all_schemes()[4]
            .sign(SignContext {
                method: Method::Post,
                base_url: "https://api.example.com",
                uri: "/v1/order/status",
                params: vec![
                    ("order_id".to_string(), "448411365".to_string()),
                    ("amount".to_string(), "2".to_string()),
                ],
                credentials: &creds,
                nonce: &nonce,
            })
            .expect("signing should succeed");

        let json: Value = serde_json::from_str(request.body.as_deref().expect("json body"))
            .expect("body should be JSON");
        assert_eq!(json["order_id"], 448411365);
        assert_eq!(json["amount"], "2");
    }

    #[test]
    fn test_customer_nonce_fields() {
        let creds = full_credentials();
        let request = sign(SignScheme::CustomerNonce, Method::Post, &creds);
        let form = request.form_pairs();
        let field = |name: &str| {
            form.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .expect("field present")
        };
        let expected = MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::UpperHex).sign(
            SECRET.as_bytes(),
            format!("{}12345public-key", field("nonce")).as_bytes(),
        );
        assert_eq!(field("signature"), expected);
        assert_eq!(field("key"), "public-key");
    }

    #[test]
    fn test_sorted_md5_signature() {
        let creds = ApiCredentials::new("public-key", "plain-secret");
        let request = sign(SignScheme::SortedMd5, Method::Post, &creds);
        let form = request.form_pairs();
        let (sign_field, signed) = form.split_last().expect("form not empty");
        assert_eq!(sign_field.0, "sign");
        let keys: Vec<&str> = signed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["api_key", "pair", "price"]);
        let message = format!("{}&secret_key=plain-secret", build_query_string(signed));
        assert_eq!(
            sign_field.1,
            DigestEncoding::UpperHex.encode(&md5_digest(message.as_bytes()))
        );
    }

    #[test]
    fn test_prehash_get_puts_params_in_path() {
        let creds = full_credentials();
        let request = sign(all_schemes()[5], Method::Get, &creds);
        assert!(request.url.contains("/v1/private/order?pair=XXBTZUSD"));
        assert!(request.body.is_none());
        assert_eq!(request.header("CB-ACCESS-PASSPHRASE"), Some("pass"));
        assert!(request.header("CB-ACCESS-TIMESTAMP").is_some());
    }

    #[test]
    fn test_amx_header_layout() {
        let creds = full_credentials();
        let request = sign(SignScheme::Amx, Method::Post, &creds);
        let auth = request.header("Authorization").expect("authorization header");
        let fields: Vec<&str> = auth.trim_start_matches("amx ").split(':').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], "public-key");
        assert!(fields[2].parse::<u64>().is_ok());
    }

    #[test]
    fn test_validate_rejects_incomplete_credentials() {
        let plain = ApiCredentials::new("key", "not base64!");
        assert!(SignScheme::Amx.validate(&plain).is_err());
        assert!(SignScheme::Prehash { header_prefix: "CB-ACCESS" }
            .validate(&ApiCredentials::new("key", SECRET))
            .is_err());
        assert!(SignScheme::CustomerNonce.validate(&ApiCredentials::new("key", "s")).is_err());
        assert!(SignScheme::SortedMd5.validate(&ApiCredentials::new("key", "")).is_err());
        assert!(SignScheme::SortedMd5.validate(&plain).is_ok());
    }

    #[test]
    fn test_unsigned_envelope() {
        let get = Envelope::unsigned(Method::Get, "https://x.io/t".to_string(), &params());
        assert!(!get.signed);
        assert_eq!(get.url, "https://x.io/t?pair=XXBTZUSD&price=100.5");
        assert!(get.body.is_none());

        let post = Envelope::unsigned(Method::Post, "https://x.io/t".to_string(), &params());
        assert_eq!(post.url, "https://x.io/t");
        assert_eq!(post.body.as_deref(), Some("pair=XXBTZUSD&price=100.5"));
    }
}
