//! GDAX
//!
//! Requests are signed over `timestamp + METHOD + path + body` with the
//! base64-decoded secret; the key, signature, timestamp and passphrase
//! travel in `CB-ACCESS-*` headers. The REST paths are unversioned.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, OrderStatus, Response};

pub static SPEC: BackendSpec = BackendSpec {
    name: "GDAX",
    base_url: "https://api.gdax.com",
    default_version: "",
    uri,
    pair_format: PairFormat::joined("-", SymbolCase::Upper),
    scheme: SignScheme::Prehash {
        header_prefix: "CB-ACCESS",
    },
    nonce_unit: NonceUnit::Seconds,
    public_method: Method::Get,
    private_method: Method::Get,
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

fn uri(_: &str, endpoint: &str) -> String {
    format!("/{}", endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new(format!("products/{}/ticker", pair)),
        Call::OrderBook { pair } => Route::new(format!("products/{}/book", pair)).param("level", 2),
        Call::Trades { pair } => Route::new(format!("products/{}/trades", pair)),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("orders")
            .param("product_id", pair)
            .param("side", side)
            .param("type", "limit")
            .param("price", price)
            .param("size", size)
            .method(Method::Post),
        Call::OrderStatus { order_id } => Route::new(format!("orders/{}", order_id)),
        Call::OpenOrders => Route::new("orders"),
        Call::CancelOrder { order_id } => {
            Route::new(format!("orders/{}", order_id)).method(Method::Delete)
        }
        Call::Wallet => Route::new("accounts"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("products"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    value
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::symbols(value, "id")
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(value, ["bid", "ask", "price", "high", "low", "volume"])
}

/// Level 2 entries are `[price, size, num_orders]`.
fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(value, ["trade_id", "price", "size", "side", "time"])
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "id")
}

fn parse_order(entry: &Value) -> Result<OrderStatus, String> {
    let filled = n::opt_num(entry, "filled_size").unwrap_or(0.0);
    let state = match entry.get("status").and_then(Value::as_str).unwrap_or_default() {
        "open" | "pending" | "active" if filled > 0.0 => OrderState::PartiallyFilled,
        "open" | "pending" | "active" => OrderState::Open,
        "done" | "settled" => match entry.get("done_reason").and_then(Value::as_str) {
            Some("canceled") => OrderState::Canceled,
            _ => OrderState::Filled,
        },
        "rejected" => OrderState::Rejected,
        other => OrderState::Unknown(other.to_string()),
    };
    order_status(entry, ["id", "side", "price", "size", "filled_size"], state)
}

fn status(_: &str, value: &Value) -> Result<Response, String> {
    parse_order(value).map(Response::OrderStatus)
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(value, "orders")?
        .iter()
        .map(parse_order)
        .collect::<Result<Vec<_>, _>>()
        .map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(value, "currency", "available")
}
