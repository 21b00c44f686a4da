//! Centralized Exchange (CEX) Backends
//!
//! Each backend is a [`BackendSpec`] record: base URL, path layout, pair
//! notation, signing scheme, per-operation routes and response formatters.
//! Adding a backend means adding a record, not a new type.

use std::str::FromStr;

use serde_json::Value;

use crate::connectors::error::ConnectorError;
use crate::connectors::nonce::NonceUnit;
use crate::connectors::pairs::PairFormat;
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, Response, Side};

pub mod binance;
pub mod bitfinex;
pub mod bitstamp;
pub mod bittrex;
pub mod cryptopia;
pub mod gdax;
pub mod gemini;
pub mod hitbtc;
pub mod kraken;
pub mod okcoin;
pub mod poloniex;

/// Supported exchange backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    Binance,
    Bitfinex,
    Bitstamp,
    Bittrex,
    Cryptopia,
    Gdax,
    Gemini,
    HitBtc,
    Kraken,
    OkCoin,
    Okex,
    Poloniex,
}

impl Backend {
    pub const ALL: [Backend; 12] = [
        Backend::Binance,
        Backend::Bitfinex,
        Backend::Bitstamp,
        Backend::Bittrex,
        Backend::Cryptopia,
        Backend::Gdax,
        Backend::Gemini,
        Backend::HitBtc,
        Backend::Kraken,
        Backend::OkCoin,
        Backend::Okex,
        Backend::Poloniex,
    ];

    pub fn spec(&self) -> &'static BackendSpec {
        match self {
            Backend::Binance => &binance::SPEC,
            Backend::Bitfinex => &bitfinex::SPEC,
            Backend::Bitstamp => &bitstamp::SPEC,
            Backend::Bittrex => &bittrex::SPEC,
            Backend::Cryptopia => &cryptopia::SPEC,
            Backend::Gdax => &gdax::SPEC,
            Backend::Gemini => &gemini::SPEC,
            Backend::HitBtc => &hitbtc::SPEC,
            Backend::Kraken => &kraken::SPEC,
            Backend::OkCoin => &okcoin::OKCOIN,
            Backend::Okex => &okcoin::OKEX,
            Backend::Poloniex => &poloniex::SPEC,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Prefix for `<PREFIX>_API_KEY` style environment variables.
    pub fn env_prefix(&self) -> String {
        self.name()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_uppercase()
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ConnectorError;

    /// Case-insensitive lookup by backend name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|backend| backend.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConnectorError::Configuration(format!("Unknown backend '{}'", s)))
    }
}

/// Transform from a decoded payload to a canonical response. Receives the
/// backend-native pair symbol (empty for pair-less operations).
pub type Formatter = fn(&str, &Value) -> Result<Response, String>;

/// Where a backend's tradable symbols come from
#[derive(Clone, Copy)]
pub enum MarketSource {
    /// Fixed list shipped with the backend record
    Static(&'static [&'static str]),
    /// Fetched once through the [`Operation::Markets`] route
    Listing(fn(&Value) -> Result<Vec<String>, String>),
}

/// Static description of one exchange backend
pub struct BackendSpec {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_version: &'static str,
    /// Request path for `(version, endpoint)`
    pub uri: fn(&str, &str) -> String,
    pub pair_format: PairFormat,
    pub scheme: SignScheme,
    pub nonce_unit: NonceUnit,
    pub public_method: Method,
    pub private_method: Method,
    pub markets: MarketSource,
    /// Backend-reported application failure hidden in a 2xx body
    pub app_error: fn(&Value) -> Option<String>,
    /// Operations that only exist under one API version
    pub version_gates: &'static [(Operation, &'static str)],
    /// Endpoint and payload per call; `None` means not implemented
    pub route: fn(&Call<'_>) -> Option<Route>,
    pub formatters: &'static [(Operation, Formatter)],
}

impl BackendSpec {
    /// Required version for `operation`, if it is gated.
    pub fn required_version(&self, operation: Operation) -> Option<&'static str> {
        self.version_gates
            .iter()
            .find(|(gated, _)| *gated == operation)
            .map(|(_, version)| *version)
    }

    pub fn formatter(&self, operation: Operation) -> Option<Formatter> {
        self.formatters
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, f)| *f)
    }
}

impl std::fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSpec")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("default_version", &self.default_version)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// One invocation of a uniform operation, with backend-native symbols
#[derive(Debug, Clone, PartialEq)]
pub enum Call<'a> {
    Ticker { pair: &'a str },
    OrderBook { pair: &'a str },
    Trades { pair: &'a str },
    Order {
        pair: &'a str,
        side: Side,
        price: f64,
        size: f64,
    },
    OrderStatus { order_id: &'a str },
    OpenOrders,
    CancelOrder { order_id: &'a str },
    Wallet,
    Withdraw {
        currency: &'a str,
        amount: f64,
        address: &'a str,
    },
    Markets,
}

impl Call<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Ticker { .. } => Operation::Ticker,
            Call::OrderBook { .. } => Operation::OrderBook,
            Call::Trades { .. } => Operation::Trades,
            Call::Order { side, .. } => side.operation(),
            Call::OrderStatus { .. } => Operation::OrderStatus,
            Call::OpenOrders => Operation::OpenOrders,
            Call::CancelOrder { .. } => Operation::CancelOrder,
            Call::Wallet => Operation::Wallet,
            Call::Withdraw { .. } => Operation::Withdraw,
            Call::Markets => Operation::Markets,
        }
    }

    /// Pair symbol the call targets, empty when it has none.
    pub fn pair(&self) -> &str {
        match self {
            Call::Ticker { pair }
            | Call::OrderBook { pair }
            | Call::Trades { pair }
            | Call::Order { pair, .. } => pair,
            _ => "",
        }
    }
}

/// Resolved endpoint for a call
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    /// Overrides the backend's public/private verb
    pub method: Option<Method>,
}

impl Route {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            method: None,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Merge caller parameters, replacing same-named entries.
    pub fn merge(mut self, extra: &[(String, String)]) -> Self {
        for (key, value) in extra {
            match self.params.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.clone(),
                None => self.params.push((key.clone(), value.clone())),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().ok(), Some(backend));
        }
        assert_eq!("kraken".parse::<Backend>().ok(), Some(Backend::Kraken));
        assert!("mtgox".parse::<Backend>().is_err());
        assert_eq!(Backend::HitBtc.env_prefix(), "HITBTC");
        assert_eq!(Backend::Gdax.to_string(), "GDAX");
    }

    #[test]
    fn test_every_backend_routes_market_data() {
        for backend in Backend::ALL {
            let spec = backend.spec();
            assert!(spec.base_url.starts_with("https://"), "{}", spec.name);
            for call in [
                Call::Ticker { pair: "X" },
                Call::OrderBook { pair: "X" },
                Call::Trades { pair: "X" },
                Call::OpenOrders,
                Call::Wallet,
            ] {
                assert!((spec.route)(&call).is_some(), "{} {:?}", spec.name, call);
            }
            if let MarketSource::Listing(_) = spec.markets {
                assert!((spec.route)(&Call::Markets).is_some(), "{}", spec.name);
            }
        }
    }

    #[test]
    fn test_route_merge_replaces_existing() {
        let route = Route::new("order")
            .param("type", "LIMIT")
            .param("price", 1.5)
            .merge(&[
                ("type".to_string(), "MARKET".to_string()),
                ("newClientOrderId".to_string(), "abc".to_string()),
            ]);
        assert_eq!(
            route.params,
            vec![
                ("type".to_string(), "MARKET".to_string()),
                ("price".to_string(), "1.5".to_string()),
                ("newClientOrderId".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_call_operation_and_pair() {
        let call = Call::Order {
            pair: "BTCUSD",
            side: Side::Sell,
            price: 1.0,
            size: 2.0,
        };
        assert_eq!(call.operation(), Operation::Ask);
        assert_eq!(call.pair(), "BTCUSD");
        assert_eq!(Call::Wallet.pair(), "");
    }
}
