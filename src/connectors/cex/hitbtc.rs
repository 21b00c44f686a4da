//! HitBTC
//!
//! API key and nonce are appended to the query; the request path and query
//! are signed with HMAC-SHA512 and sent in `Api-Signature`.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, OrderStatus, Response, Trade};

pub static SPEC: BackendSpec = BackendSpec {
    name: "HitBTC",
    base_url: "https://api.hitbtc.com",
    default_version: "1",
    uri,
    pair_format: PairFormat::joined("", SymbolCase::Upper),
    scheme: SignScheme::SignedUri {
        mac: MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Hex),
        key_param: "apikey",
        nonce_param: "nonce",
        signature_header: "Api-Signature",
        sign_full_url: false,
    },
    nonce_unit: NonceUnit::Millis,
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
        (Operation::Bid, report),
        (Operation::Ask, report),
        (Operation::OrderStatus, status),
        (Operation::OpenOrders, open_orders),
        (Operation::CancelOrder, report),
        (Operation::Wallet, wallet),
    ],
};

fn uri(version: &str, endpoint: &str) -> String {
    format!("/api/{}/{}", version, endpoint)
}

/// Client order ids must be unique per account; microseconds suffice for
/// a single client.
fn client_order_id() -> String {
    format!("bitex{}", chrono::Utc::now().timestamp_micros())
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new(format!("public/{}/ticker", pair)),
        Call::OrderBook { pair } => Route::new(format!("public/{}/orderbook", pair)),
        Call::Trades { pair } => Route::new(format!("public/{}/trades", pair))
            .param("from", 0)
            .param("by", "trade_id")
            .param("sort", "desc"),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("trading/new_order")
            .param("clientOrderId", client_order_id())
            .param("symbol", pair)
            .param("side", side)
            .param("price", price)
            .param("quantity", size)
            .param("type", "limit")
            .method(Method::Post),
        Call::OrderStatus { order_id } => {
            Route::new("trading/order").param("client_order_id", order_id)
        }
        Call::OpenOrders => Route::new("trading/orders/active"),
        Call::CancelOrder { order_id } => Route::new("trading/cancel_order")
            .param("clientOrderId", order_id)
            .method(Method::Post),
        Call::Wallet => Route::new("trading/balance"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("public/symbols"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    if let Some(error) = value.get("error") {
        return Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        );
    }
    value
        .get("CancelReject")
        .or_else(|| value.get("ExecutionReport").filter(|r| r["orderStatus"] == "rejected"))
        .map(|reject| reject.to_string())
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::symbols(n::field(value, "symbols")?, "symbol")
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(value, ["bid", "ask", "last", "high", "low", "volume"])
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

/// Trades are `[tid, price, amount, timestamp_ms, side]` arrays.
fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::array(n::field(value, "trades")?, "trades")?
        .iter()
        .map(|entry| -> Result<Trade, String> {
            let fields = n::array(entry, "trade")?;
            let at = |i: usize| fields.get(i).and_then(n::number);
            Ok(Trade {
                id: fields.first().and_then(n::text),
                price: at(1).ok_or_else(|| format!("bad trade: {}", entry))?,
                amount: at(2).ok_or_else(|| format!("bad trade: {}", entry))?,
                side: fields.get(4).and_then(n::side),
                timestamp: fields.get(3).and_then(n::timestamp),
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Response::Trades)
}

fn report(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(n::field(value, "ExecutionReport")?, "clientOrderId")
}

fn parse_order(entry: &Value) -> Result<OrderStatus, String> {
    let state = match entry.get("orderStatus").and_then(Value::as_str).unwrap_or_default() {
        "new" => OrderState::Open,
        "partiallyFilled" => OrderState::PartiallyFilled,
        "filled" => OrderState::Filled,
        "canceled" | "expired" => OrderState::Canceled,
        "rejected" => OrderState::Rejected,
        other => OrderState::Unknown(other.to_string()),
    };
    order_status(
        entry,
        ["clientOrderId", "side", "orderPrice", "orderQuantity", "cumQuantity"],
        state,
    )
}

fn status(_: &str, value: &Value) -> Result<Response, String> {
    let first = n::array(n::field(value, "orders")?, "orders")?
        .first()
        .ok_or_else(|| "order not found".to_string())?;
    parse_order(first).map(Response::OrderStatus)
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(n::field(value, "orders")?, "orders")?
        .iter()
        .map(parse_order)
        .collect::<Result<Vec<_>, _>>()
        .map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(n::field(value, "balance")?, "currency_code", "cash")
}
