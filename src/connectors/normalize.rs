//! Response normalization
//!
//! [`ResponseNormalizer`] is a registry from `(backend, operation)` to a
//! transform producing a canonical [`Response`]. Every response is first
//! basic-decoded (status check, JSON parse, backend application-error
//! check); when no transform is registered the decoded JSON is returned
//! unchanged as [`Response::Raw`].
//!
//! The free functions below are the building blocks the backend
//! formatters share. They coerce numeric strings to `f64` and never
//! reorder order-book levels.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::connectors::cex::Backend;
use crate::connectors::error::ConnectorError;
use crate::connectors::transport::RawResponse;
use crate::connectors::types::{
    Level, OrderBook, OrderState, OrderStatus, Operation, Response, Side, Ticker, Trade,
    WalletBalances,
};

/// Registered transform. Receives the backend-native pair symbol (empty
/// for pair-less operations) and the decoded payload.
pub type Transform = Arc<dyn Fn(&str, &Value) -> Result<Response, String> + Send + Sync>;

/// `(backend, operation) -> transform` registry
#[derive(Clone, Default)]
pub struct ResponseNormalizer {
    transforms: HashMap<(Backend, Operation), Transform>,
}

impl ResponseNormalizer {
    /// Empty registry: every response passes through as `Raw`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every backend's built-in formatters.
    pub fn with_builtin() -> Self {
        let mut normalizer = Self::new();
        for backend in Backend::ALL {
            for (operation, formatter) in backend.spec().formatters {
                normalizer.register(backend, *operation, *formatter);
            }
        }
        normalizer
    }

    /// Register (or replace) the transform for `backend`/`operation`.
    pub fn register<F>(&mut self, backend: Backend, operation: Operation, transform: F)
    where
        F: Fn(&str, &Value) -> Result<Response, String> + Send + Sync + 'static,
    {
        self.transforms
            .insert((backend, operation), Arc::new(transform));
    }

    pub fn contains(&self, backend: Backend, operation: Operation) -> bool {
        self.transforms.contains_key(&(backend, operation))
    }

    /// Status check, JSON decode and backend application-error check.
    pub fn decode(
        &self,
        backend: Backend,
        operation: Operation,
        raw: &RawResponse,
    ) -> Result<Value, ConnectorError> {
        if !raw.is_success() {
            // Error bodies often carry the backend's own message
            let message = serde_json::from_str::<Value>(&raw.body)
                .ok()
                .and_then(|value| (backend.spec().app_error)(&value))
                .unwrap_or_else(|| format!("HTTP {}", raw.status));
            return Err(ConnectorError::Request {
                backend: backend.name().to_string(),
                operation: operation.name().to_string(),
                status: raw.status,
                message,
                body: raw.body.clone(),
            });
        }

        let value: Value = serde_json::from_str(&raw.body).map_err(|e| ConnectorError::Decode {
            backend: backend.name().to_string(),
            operation: operation.name().to_string(),
            message: e.to_string(),
            body: raw.body.clone(),
        })?;

        if let Some(message) = (backend.spec().app_error)(&value) {
            warn!("{} reported failure on {}: {}", backend, operation, message);
            return Err(ConnectorError::Request {
                backend: backend.name().to_string(),
                operation: operation.name().to_string(),
                status: raw.status,
                message,
                body: raw.body.clone(),
            });
        }

        Ok(value)
    }

    /// Decode `raw` and apply the registered transform, if any.
    pub fn normalize(
        &self,
        backend: Backend,
        operation: Operation,
        pair: &str,
        raw: &RawResponse,
    ) -> Result<Response, ConnectorError> {
        let value = self.decode(backend, operation, raw)?;
        match self.transforms.get(&(backend, operation)) {
            Some(transform) => transform(pair, &value).map_err(|message| ConnectorError::Decode {
                backend: backend.name().to_string(),
                operation: operation.name().to_string(),
                message,
                body: raw.body.clone(),
            }),
            None => Ok(Response::Raw(value)),
        }
    }
}

impl std::fmt::Debug for ResponseNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.transforms.keys().collect();
        keys.sort();
        f.debug_struct("ResponseNormalizer")
            .field("transforms", &keys)
            .finish()
    }
}

// =========================================================================
// Field access and coercion
// =========================================================================

/// Numeric value from a JSON number or numeric string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value, String> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| format!("missing field '{}'", key))
}

/// Follow a path of object keys, e.g. `["info", "funds", "free"]`.
pub fn path<'a>(value: &'a Value, keys: &[&str]) -> Result<&'a Value, String> {
    keys.iter().try_fold(value, |current, key| field(current, key))
}

pub fn num_field(value: &Value, key: &str) -> Result<f64, String> {
    let raw = field(value, key)?;
    number(raw).ok_or_else(|| format!("field '{}' is not numeric: {}", key, raw))
}

pub fn opt_num(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(number)
}

/// String rendering of a string or numeric id.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn text_field(value: &Value, key: &str) -> Result<String, String> {
    let raw = field(value, key)?;
    text(raw).ok_or_else(|| format!("field '{}' is not an id: {}", key, raw))
}

pub fn array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected {} to be an array", what))
}

/// Lenient side parsing: `buy`/`bid`/`b` and `sell`/`ask`/`s`.
pub fn side(value: &Value) -> Option<Side> {
    let raw = value.as_str()?.to_ascii_lowercase();
    if raw.starts_with("buy") || raw == "bid" || raw == "b" || raw.ends_with("_buy") {
        Some(Side::Buy)
    } else if raw.starts_with("sell") || raw == "ask" || raw == "s" || raw.ends_with("_sell") {
        Some(Side::Sell)
    } else {
        None
    }
}

/// Unix seconds from seconds, milliseconds or an RFC 3339 string.
pub fn timestamp(value: &Value) -> Option<i64> {
    if let Some(s) = value.as_str() {
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(s) {
            return Some(parsed.timestamp());
        }
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(parsed.and_utc().timestamp());
        }
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(parsed.and_utc().timestamp());
        }
    }
    let seconds = number(value)?;
    // Anything past year 5138 in seconds is really milliseconds.
    if seconds > 1e11 {
        Some((seconds / 1000.0) as i64)
    } else {
        Some(seconds as i64)
    }
}

// =========================================================================
// Canonical builders
// =========================================================================

/// One level from `[price, amount, ...]` or `{"price", "amount"}`.
pub fn level(entry: &Value) -> Result<Level, String> {
    match entry {
        Value::Array(items) if items.len() >= 2 => Ok(Level {
            price: number(&items[0]).ok_or_else(|| format!("bad price: {}", items[0]))?,
            amount: number(&items[1]).ok_or_else(|| format!("bad amount: {}", items[1]))?,
        }),
        Value::Object(_) => level_keyed(entry, "price", "amount"),
        other => Err(format!("unrecognized order book level: {}", other)),
    }
}

pub fn level_keyed(entry: &Value, price_key: &str, amount_key: &str) -> Result<Level, String> {
    Ok(Level {
        price: num_field(entry, price_key)?,
        amount: num_field(entry, amount_key)?,
    })
}

/// Levels in exchange order.
pub fn levels(side: &Value) -> Result<Vec<Level>, String> {
    array(side, "order book side")?.iter().map(level).collect()
}

/// Order book with sides under `bids_key`/`asks_key`, remapped to bids/asks.
pub fn book(value: &Value, bids_key: &str, asks_key: &str) -> Result<Response, String> {
    Ok(Response::OrderBook(OrderBook {
        bids: levels(field(value, bids_key)?)?,
        asks: levels(field(value, asks_key)?)?,
    }))
}

/// Order book whose levels are objects with backend-specific keys.
pub fn book_keyed(
    value: &Value,
    (bids_key, asks_key): (&str, &str),
    (price_key, amount_key): (&str, &str),
) -> Result<Response, String> {
    let collect_side = |key: &str| -> Result<Vec<Level>, String> {
        array(field(value, key)?, key)?
            .iter()
            .map(|entry| level_keyed(entry, price_key, amount_key))
            .collect()
    };
    Ok(Response::OrderBook(OrderBook {
        bids: collect_side(bids_key)?,
        asks: collect_side(asks_key)?,
    }))
}

/// Field names of a ticker payload: bid, ask, last, high, low, volume
pub type TickerKeys<'a> = [&'a str; 6];

pub fn ticker(value: &Value, keys: TickerKeys<'_>) -> Result<Response, String> {
    let [bid, ask, last, high, low, volume] = keys;
    Ok(Response::Ticker(Ticker {
        bid: num_field(value, bid)?,
        ask: num_field(value, ask)?,
        last: num_field(value, last)?,
        high: opt_num(value, high),
        low: opt_num(value, low),
        volume: opt_num(value, volume),
    }))
}

/// Field names of a trade object: id, price, amount, side, timestamp
pub type TradeKeys<'a> = [&'a str; 5];

pub fn trades(value: &Value, keys: TradeKeys<'_>) -> Result<Response, String> {
    let [id, price, amount, side_key, time] = keys;
    array(value, "trades")?
        .iter()
        .map(|entry| -> Result<Trade, String> {
            Ok(Trade {
                id: entry.get(id).and_then(text),
                price: num_field(entry, price)?,
                amount: num_field(entry, amount)?.abs(),
                side: entry.get(side_key).and_then(side),
                timestamp: entry.get(time).and_then(timestamp),
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Response::Trades)
}

/// Order id from `key`, accepting string or numeric ids.
pub fn order_id(value: &Value, key: &str) -> Result<Response, String> {
    text_field(value, key).map(Response::OrderId)
}

/// Wallet from a list of `{currency_key, amount_key}` objects. Entries for
/// the same currency are summed before filtering.
pub fn wallet_list(value: &Value, currency_key: &str, amount_key: &str) -> Result<Response, String> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for entry in array(value, "balances")? {
        let currency = text_field(entry, currency_key)?.to_uppercase();
        let amount = opt_num(entry, amount_key).unwrap_or(0.0);
        *totals.entry(currency).or_insert(0.0) += amount;
    }
    Ok(Response::Wallet(totals.into_iter().collect()))
}

/// Wallet from a `{currency: amount}` object.
pub fn wallet_map(value: &Value) -> Result<Response, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "expected balances to be an object".to_string())?;
    Ok(Response::Wallet(
        object
            .iter()
            .filter_map(|(currency, amount)| number(amount).map(|a| (currency.to_uppercase(), a)))
            .collect::<WalletBalances>(),
    ))
}

/// Field names of an order object: id, side, price, amount, filled
pub type OrderKeys<'a> = [&'a str; 5];

/// Order status from an object, with `state` computed by the caller.
pub fn order_status(entry: &Value, keys: OrderKeys<'_>, state: OrderState) -> Result<OrderStatus, String> {
    let [id, side_key, price, amount, filled] = keys;
    Ok(OrderStatus {
        order_id: text_field(entry, id)?,
        state,
        side: entry.get(side_key).and_then(side),
        price: opt_num(entry, price),
        amount: opt_num(entry, amount),
        filled: opt_num(entry, filled),
    })
}

/// State from the amounts when the backend only reports liveness.
pub fn infer_state(open: bool, canceled: bool, amount: Option<f64>, filled: Option<f64>) -> OrderState {
    let filled = filled.unwrap_or(0.0);
    match (open, canceled) {
        (_, true) => OrderState::Canceled,
        (true, _) if filled > 0.0 => OrderState::PartiallyFilled,
        (true, _) => OrderState::Open,
        (false, _) if amount.map_or(false, |a| filled >= a) => OrderState::Filled,
        (false, _) if filled > 0.0 => OrderState::PartiallyFilled,
        (false, _) => OrderState::Unknown("closed".to_string()),
    }
}

/// Symbols from a list of objects carrying the symbol under `key`.
pub fn symbols(value: &Value, key: &str) -> Result<Vec<String>, String> {
    array(value, "markets")?
        .iter()
        .map(|entry| text_field(entry, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> RawResponse {
        RawResponse::new(200, body)
    }

    #[test]
    fn test_bids_asks_fixture_normalizes_exactly() {
        let normalizer = ResponseNormalizer::with_builtin();
        let raw = ok(r#"{"bids":[["100.5","2"]], "asks":[["101.0","1"]]}"#);

        for _ in 0..2 {
            let result = normalizer
                .normalize(Backend::Binance, Operation::OrderBook, "BTCUSDT", &raw)
                .expect("order book should normalize");
            assert_eq!(
                result.to_value(),
                json!({"bids":[{"price":100.5,"amount":2.0}], "asks":[{"price":101.0,"amount":1.0}]})
            );
        }
    }

    #[test]
    fn test_balances_fixture_drops_zero() {
        let normalizer = ResponseNormalizer::with_builtin();
        let raw = ok(r#"{"balances":[{"asset":"BTC","free":"0.5"},{"asset":"ETH","free":"0.0"}]}"#);
        let result = normalizer
            .normalize(Backend::Binance, Operation::Wallet, "", &raw)
            .expect("wallet should normalize");
        assert_eq!(result.to_value(), json!({"BTC": 0.5}));
    }

    #[test]
    fn test_missing_transform_passes_through() {
        let normalizer = ResponseNormalizer::new();
        let raw = ok(r#"{"anything": [1, 2]}"#);
        let result = normalizer
            .normalize(Backend::Kraken, Operation::Ticker, "XXBTZUSD", &raw)
            .expect("pass-through");
        assert_eq!(result, Response::Raw(json!({"anything": [1, 2]})));
    }

    #[test]
    fn test_non_success_status_is_request_error() {
        let normalizer = ResponseNormalizer::with_builtin();
        let err = normalizer
            .normalize(Backend::Gdax, Operation::Ticker, "BTC-USD", &RawResponse::new(503, "busy"))
            .expect_err("503 must fail");
        assert!(matches!(err, ConnectorError::Request { status: 503, .. }));
        assert_eq!(err.raw_body(), Some("busy"));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let normalizer = ResponseNormalizer::new();
        let err = normalizer
            .normalize(Backend::Gemini, Operation::Ticker, "btcusd", &ok("<html>"))
            .expect_err("html must fail");
        assert!(matches!(err, ConnectorError::Decode { .. }));
        assert!(err.is_request_error());
    }

    #[test]
    fn test_app_error_becomes_request_error() {
        let normalizer = ResponseNormalizer::new();
        let raw = ok(r#"{"success":false,"message":"INVALID_MARKET","result":null}"#);
        let err = normalizer
            .normalize(Backend::Bittrex, Operation::Ticker, "USD-BTC", &raw)
            .expect_err("application failure");
        match err {
            ConnectorError::Request { message, status, .. } => {
                assert_eq!(message, "INVALID_MARKET");
                assert_eq!(status, 200);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_registered_closure_overrides_builtin() {
        let mut normalizer = ResponseNormalizer::with_builtin();
        normalizer.register(Backend::Binance, Operation::Ticker, |pair, value| {
            Ok(Response::Raw(json!({"pair": pair, "price": number(&value["price"])})))
        });
        let result = normalizer
            .normalize(Backend::Binance, Operation::Ticker, "ETHBTC", &ok(r#"{"price":"0.07"}"#))
            .expect("custom transform");
        assert_eq!(result.to_value(), json!({"pair": "ETHBTC", "price": 0.07}));
    }

    #[test]
    fn test_transform_failure_is_decode_error() {
        let normalizer = ResponseNormalizer::with_builtin();
        let err = normalizer
            .normalize(Backend::Binance, Operation::OrderBook, "BTCUSDT", &ok(r#"{"bids": 5}"#))
            .expect_err("shape mismatch");
        assert!(matches!(err, ConnectorError::Decode { .. }));
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(number(&json!("1.25")), Some(1.25));
        assert_eq!(number(&json!(3)), Some(3.0));
        assert_eq!(number(&json!(" 7 ")), Some(7.0));
        assert_eq!(number(&json!("abc")), None);
        assert_eq!(number(&json!(null)), None);
    }

    #[test]
    fn test_level_forms() {
        assert_eq!(
            level(&json!(["1.5", 2, 1499040000])).ok(),
            Some(Level { price: 1.5, amount: 2.0 })
        );
        assert_eq!(
            level(&json!({"price": "3", "amount": "0.1", "timestamp": "1"})).ok(),
            Some(Level { price: 3.0, amount: 0.1 })
        );
        assert!(level(&json!(["1"])).is_err());
    }

    #[test]
    fn test_book_keeps_exchange_order() {
        let value = json!({"buy": [{"Rate": 2, "Quantity": 1}, {"Rate": 3, "Quantity": 1}], "sell": []});
        let result = book_keyed(&value, ("buy", "sell"), ("Rate", "Quantity")).expect("book");
        let book = result.as_order_book().expect("order book");
        assert_eq!(book.bids[0].price, 2.0);
        assert_eq!(book.bids[1].price, 3.0);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_wallet_list_sums_duplicates() {
        let value = json!([
            {"currency": "btc", "available": "0.25"},
            {"currency": "BTC", "available": "0.25"},
            {"currency": "usd", "available": "0"}
        ]);
        let wallet = wallet_list(&value, "currency", "available").expect("wallet");
        assert_eq!(wallet.to_value(), json!({"BTC": 0.5}));
    }

    #[test]
    fn test_timestamp_forms() {
        assert_eq!(timestamp(&json!(1499827319)), Some(1499827319));
        assert_eq!(timestamp(&json!(1499827319559u64)), Some(1499827319));
        assert_eq!(timestamp(&json!("2017-07-12T02:41:59.559Z")), Some(1499827319));
        assert_eq!(timestamp(&json!("2017-07-12 02:41:59")), Some(1499827319));
    }

    #[test]
    fn test_infer_state() {
        assert_eq!(infer_state(true, false, Some(1.0), Some(0.0)), OrderState::Open);
        assert_eq!(infer_state(true, false, Some(1.0), Some(0.4)), OrderState::PartiallyFilled);
        assert_eq!(infer_state(false, false, Some(1.0), Some(1.0)), OrderState::Filled);
        assert_eq!(infer_state(false, true, Some(1.0), Some(0.0)), OrderState::Canceled);
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!(side(&json!("BUY")), Some(Side::Buy));
        assert_eq!(side(&json!("LIMIT_SELL")), Some(Side::Sell));
        assert_eq!(side(&json!("b")), Some(Side::Buy));
        assert_eq!(side(&json!("other")), None);
    }
}
