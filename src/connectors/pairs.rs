//! Trading pairs and their per-backend notation
//!
//! A [`CanonicalPair`] is the backend-independent `(base, quote)` pair.
//! [`PairFormat`] turns it into a backend's symbol string; only that
//! direction is supported, symbols are never parsed back.

use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;

use tokio::sync::OnceCell;

use crate::connectors::cex::Backend;
use crate::connectors::error::ConnectorError;

/// Immutable `(base, quote)` pair of uppercase asset tickers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPair {
    base: String,
    quote: String,
}

impl CanonicalPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Symbol for this pair in the given backend's notation.
    pub fn format_for(&self, backend: Backend) -> String {
        backend.spec().pair_format.format(self)
    }
}

impl std::fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CanonicalPair {
    type Err = ConnectorError;

    /// Parse `BASE/QUOTE`, `BASE-QUOTE` or `BASE_QUOTE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['/', '-', '_']);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.trim().is_empty() && !quote.trim().is_empty() => {
                Ok(CanonicalPair::new(base, quote))
            }
            _ => Err(ConnectorError::InvalidRequest(format!(
                "Cannot parse pair '{}', expected BASE/QUOTE",
                s
            ))),
        }
    }
}

/// Pair argument accepted by pair-validated operations: either a canonical
/// pair (translated per backend) or an already backend-native symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairInput {
    Canonical(CanonicalPair),
    Symbol(String),
}

impl PairInput {
    /// Backend-native symbol for this input.
    pub fn symbol_for(&self, backend: Backend) -> String {
        match self {
            PairInput::Canonical(pair) => pair.format_for(backend),
            PairInput::Symbol(symbol) => symbol.clone(),
        }
    }
}

impl From<CanonicalPair> for PairInput {
    fn from(pair: CanonicalPair) -> Self {
        PairInput::Canonical(pair)
    }
}

impl From<&CanonicalPair> for PairInput {
    fn from(pair: &CanonicalPair) -> Self {
        PairInput::Canonical(pair.clone())
    }
}

impl From<&str> for PairInput {
    fn from(symbol: &str) -> Self {
        PairInput::Symbol(symbol.to_string())
    }
}

impl From<String> for PairInput {
    fn from(symbol: String) -> Self {
        PairInput::Symbol(symbol)
    }
}

/// Letter case of a joined symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCase {
    Upper,
    Lower,
}

/// Backend symbol notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairFormat {
    /// `base{sep}quote` (or `quote{sep}base` when `quote_first`)
    Joined {
        separator: &'static str,
        case: SymbolCase,
        quote_first: bool,
    },
    /// Kraken asset codes: `XBT` for bitcoin, `Z` prefix for fiat,
    /// `X` prefix for crypto, none for newer listings
    Kraken,
}

const KRAKEN_FIAT: [&str; 5] = ["EUR", "GBP", "JPY", "USD", "CAD"];
const KRAKEN_UNPREFIXED: [&str; 2] = ["BCH", "DASH"];

impl PairFormat {
    pub const fn joined(separator: &'static str, case: SymbolCase) -> Self {
        PairFormat::Joined {
            separator,
            case,
            quote_first: false,
        }
    }

    pub const fn reversed(separator: &'static str, case: SymbolCase) -> Self {
        PairFormat::Joined {
            separator,
            case,
            quote_first: true,
        }
    }

    pub fn format(&self, pair: &CanonicalPair) -> String {
        match *self {
            PairFormat::Joined {
                separator,
                case,
                quote_first,
            } => {
                let (first, second) = if quote_first {
                    (pair.quote(), pair.base())
                } else {
                    (pair.base(), pair.quote())
                };
                let symbol = format!("{}{}{}", first, separator, second);
                match case {
                    SymbolCase::Upper => symbol,
                    SymbolCase::Lower => symbol.to_lowercase(),
                }
            }
            PairFormat::Kraken => format!(
                "{}{}",
                kraken_asset(pair.base()),
                kraken_asset(pair.quote())
            ),
        }
    }
}

fn kraken_asset(asset: &str) -> String {
    let asset = if asset == "BTC" { "XBT" } else { asset };
    if KRAKEN_UNPREFIXED.contains(&asset) {
        asset.to_string()
    } else if KRAKEN_FIAT.contains(&asset) {
        format!("Z{}", asset)
    } else {
        format!("X{}", asset)
    }
}

/// Backend-native symbols a backend accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPairs(HashSet<String>);

impl SupportedPairs {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(symbols.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

/// Per-instance supported pair cache.
///
/// Populated at most once: concurrent first users wait on the same fetch.
/// A failed fetch leaves the cache empty so a later call can retry. There
/// is no expiry; a new instance is needed to observe listing changes.
#[derive(Debug, Default)]
pub struct PairCache {
    cell: OnceCell<SupportedPairs>,
}

impl PairCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&SupportedPairs> {
        self.cell.get()
    }

    /// Populate the cache up front; ignored if already populated.
    pub fn seed(&self, pairs: SupportedPairs) -> bool {
        self.cell.set(pairs).is_ok()
    }

    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<&SupportedPairs, ConnectorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SupportedPairs, ConnectorError>>,
    {
        self.cell
            .get_or_try_init(fetch)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_canonical_pair_is_uppercase() {
        let pair = CanonicalPair::new("btc", "usd");
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "USD");
        assert_eq!(pair, CanonicalPair::new("BTC", "USD"));
        assert_eq!(pair.to_string(), "BTC/USD");
    }

    #[test]
    fn test_parse_combined_string() {
        assert_eq!("eth/btc".parse::<CanonicalPair>().ok(), Some(CanonicalPair::new("ETH", "BTC")));
        assert_eq!("XRP-USDT".parse::<CanonicalPair>().ok(), Some(CanonicalPair::new("XRP", "USDT")));
        assert_eq!("LTC_EUR".parse::<CanonicalPair>().ok(), Some(CanonicalPair::new("LTC", "EUR")));
        assert!("BTCUSD".parse::<CanonicalPair>().is_err());
        assert!("BTC/".parse::<CanonicalPair>().is_err());
        assert!("A/B/C".parse::<CanonicalPair>().is_err());
    }

    #[test]
    fn test_joined_formats() {
        let pair = CanonicalPair::new("ETH", "BTC");
        assert_eq!(PairFormat::joined("", SymbolCase::Upper).format(&pair), "ETHBTC");
        assert_eq!(PairFormat::joined("_", SymbolCase::Lower).format(&pair), "eth_btc");
        assert_eq!(PairFormat::joined("-", SymbolCase::Upper).format(&pair), "ETH-BTC");
        assert_eq!(PairFormat::reversed("-", SymbolCase::Upper).format(&pair), "BTC-ETH");
        assert_eq!(PairFormat::reversed("_", SymbolCase::Upper).format(&pair), "BTC_ETH");
    }

    #[test]
    fn test_kraken_format() {
        assert_eq!(PairFormat::Kraken.format(&CanonicalPair::new("BTC", "USD")), "XXBTZUSD");
        assert_eq!(PairFormat::Kraken.format(&CanonicalPair::new("ETH", "BTC")), "XETHXXBT");
        assert_eq!(PairFormat::Kraken.format(&CanonicalPair::new("BCH", "EUR")), "BCHZEUR");
    }

    #[test]
    fn test_format_for_is_deterministic_for_every_backend() {
        let pair = CanonicalPair::new("LTC", "BTC");
        for backend in Backend::ALL {
            let first = pair.format_for(backend);
            assert!(!first.is_empty());
            assert_eq!(first, pair.format_for(backend));
        }
    }

    #[test]
    fn test_pair_input_conversion() {
        let canonical = PairInput::from(CanonicalPair::new("BTC", "USDT"));
        assert_eq!(canonical.symbol_for(Backend::Binance), "BTCUSDT");
        assert_eq!(canonical.symbol_for(Backend::Bittrex), "USDT-BTC");
        assert_eq!(PairInput::from("tBTCUSD").symbol_for(Backend::Binance), "tBTCUSD");
    }

    #[tokio::test]
    async fn test_cache_fetches_once() {
        let cache = PairCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let pairs = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(SupportedPairs::new(["BTCUSD"]))
                })
                .await
                .expect("fetch should succeed");
            assert!(pairs.contains("BTCUSD"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_single_flight_under_concurrency() {
        let cache = Arc::new(PairCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    let pairs = cache
                        .get_or_fetch(|| async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok(SupportedPairs::new(["ETHBTC", "LTCBTC"]))
                        })
                        .await
                        .expect("fetch should succeed");
                    pairs.len()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.expect("task panicked"), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_retries_after_failure() {
        let cache = PairCache::new();

        let failed = cache
            .get_or_fetch(|| async { Err(ConnectorError::Network("down".to_string())) })
            .await;
        assert!(failed.is_err());
        assert!(cache.get().is_none());

        let ok = cache
            .get_or_fetch(|| async { Ok(SupportedPairs::new(["XBTUSD"])) })
            .await;
        assert!(ok.is_ok());
    }
}
