//! Kraken
//!
//! Private calls POST a form body containing the nonce. `API-Sign` is
//! HMAC-SHA512 over `uri + SHA256(nonce + body)` keyed with the
//! base64-decoded secret. Payloads sit under `result`, failures are listed
//! in `error`.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize as n;
use crate::connectors::pairs::PairFormat;
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, OrderStatus, Response, Ticker, Trade};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Kraken",
    base_url: "https://api.kraken.com",
    default_version: "0",
    uri,
    pair_format: PairFormat::Kraken,
    scheme: SignScheme::PathDigest {
        key_header: "API-Key",
        signature_header: "API-Sign",
    },
    nonce_unit: NonceUnit::Millis,
    public_method: Method::Get,
    private_method: Method::Post,
    markets: MarketSource::Listing(markets),
    app_error,
    version_gates: &[],
    route,
    formatters: &[
        (Operation::Ticker, ticker),
        (Operation::OrderBook, order_book),
        (Operation::Trades, trades),
        (Operation::Bid, placed),
        (Operation::Ask, placed),
        (Operation::OrderStatus, status),
        (Operation::OpenOrders, open_orders),
        (Operation::Wallet, wallet),
    ],
};

fn uri(version: &str, endpoint: &str) -> String {
    format!("/{}/{}", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new("public/Ticker").param("pair", pair),
        Call::OrderBook { pair } => Route::new("public/Depth").param("pair", pair),
        Call::Trades { pair } => Route::new("public/Trades").param("pair", pair),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("private/AddOrder")
            .param("pair", pair)
            .param("type", side)
            .param("ordertype", "limit")
            .param("price", price)
            .param("volume", size),
        Call::OrderStatus { order_id } => Route::new("private/QueryOrders")
            .param("txid", order_id)
            .param("trades", true),
        Call::OpenOrders => Route::new("private/OpenOrders"),
        Call::CancelOrder { order_id } => Route::new("private/CancelOrder").param("txid", order_id),
        Call::Wallet => Route::new("private/Balance"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("public/AssetPairs"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    let errors = value.get("error")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn result(value: &Value) -> Result<&Value, String> {
    n::field(value, "result")
}

/// Dark-pool listings (`.d` suffix) are not tradable through the book.
fn markets(value: &Value) -> Result<Vec<String>, String> {
    let pairs = result(value)?
        .as_object()
        .ok_or_else(|| "expected asset pairs object".to_string())?;
    Ok(pairs
        .keys()
        .filter(|pair| !pair.ends_with(".d"))
        .cloned()
        .collect())
}

/// Element `index` of an array field, e.g. `a: [price, whole_lot, lot]`.
fn head(value: &Value, key: &str, index: usize) -> Option<f64> {
    value.get(key)?.get(index).and_then(n::number)
}

fn ticker(pair: &str, value: &Value) -> Result<Response, String> {
    let entry = n::field(result(value)?, pair)?;
    let required = |key: &str| head(entry, key, 0).ok_or_else(|| format!("missing field '{}'", key));
    Ok(Response::Ticker(Ticker {
        bid: required("b")?,
        ask: required("a")?,
        last: required("c")?,
        high: head(entry, "h", 1),
        low: head(entry, "l", 1),
        volume: head(entry, "v", 1),
    }))
}

/// Kraken may answer under a different pair alias, so take the only key.
fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    let book = result(value)?
        .as_object()
        .and_then(|pairs| pairs.values().next())
        .ok_or_else(|| "empty depth result".to_string())?;
    n::book(book, "bids", "asks")
}

/// Trades are `[price, volume, time, side, ordertype, misc]`.
fn trades(pair: &str, value: &Value) -> Result<Response, String> {
    let result = result(value)?;
    let entries = result
        .get(pair)
        .or_else(|| {
            result
                .as_object()?
                .iter()
                .find(|(key, _)| key.as_str() != "last")
                .map(|(_, entries)| entries)
        })
        .ok_or_else(|| format!("no trades for {}", pair))?;
    n::array(entries, "trades")?
        .iter()
        .map(|entry| -> Result<Trade, String> {
            let level = n::level(entry)?;
            Ok(Trade {
                id: None,
                price: level.price,
                amount: level.amount,
                side: entry.get(3).and_then(n::side),
                timestamp: entry.get(2).and_then(n::timestamp),
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Response::Trades)
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::array(n::field(result(value)?, "txid")?, "txid")?
        .first()
        .and_then(n::text)
        .map(Response::OrderId)
        .ok_or_else(|| "no txid in response".to_string())
}

fn parse_order(id: &str, entry: &Value) -> OrderStatus {
    let filled = n::opt_num(entry, "vol_exec");
    let state = match entry.get("status").and_then(Value::as_str).unwrap_or_default() {
        "pending" | "open" if filled.unwrap_or(0.0) > 0.0 => OrderState::PartiallyFilled,
        "pending" | "open" => OrderState::Open,
        "closed" => OrderState::Filled,
        "canceled" | "expired" => OrderState::Canceled,
        other => OrderState::Unknown(other.to_string()),
    };
    let descr = entry.get("descr");
    OrderStatus {
        order_id: id.to_string(),
        state,
        side: descr.and_then(|d| d.get("type")).and_then(n::side),
        // descr.price is 0 for market orders
        price: descr
            .and_then(|d| d.get("price"))
            .and_then(n::number)
            .filter(|price| *price > 0.0)
            .or_else(|| n::opt_num(entry, "price")),
        amount: n::opt_num(entry, "vol"),
        filled,
    }
}

fn orders_from(object: &Value) -> Result<Vec<OrderStatus>, String> {
    Ok(object
        .as_object()
        .ok_or_else(|| "expected orders object".to_string())?
        .iter()
        .map(|(id, entry)| parse_order(id, entry))
        .collect::<Vec<_>>())
}

fn status(_: &str, value: &Value) -> Result<Response, String> {
    orders_from(result(value)?)?
        .into_iter()
        .next()
        .map(Response::OrderStatus)
        .ok_or_else(|| "order not found".to_string())
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    orders_from(n::field(result(value)?, "open")?).map(Response::Orders)
}

/// Balances keep Kraken's asset codes (`XXBT`, `ZUSD`).
fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_map(result(value)?)
}
