//! Bitfinex
//!
//! v1 private calls carry a base64 JSON payload signed with HMAC-SHA384 in
//! the `X-BFX-*` headers. v2 authentication is not supported, so every
//! private operation is gated to v1.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, infer_state, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderStatus, Response};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Bitfinex",
    base_url: "https://api.bitfinex.com",
    default_version: "v1",
    uri,
    pair_format: PairFormat::joined("", SymbolCase::Lower),
    scheme: SignScheme::EncodedPayload {
        mac: MacSpec::new(HashAlgorithm::Sha384, DigestEncoding::Hex),
        header_prefix: "X-BFX",
        send_body: true,
        integer_params: &["order_id"],
    },
    nonce_unit: NonceUnit::Micros,
    public_method: Method::Get,
    private_method: Method::Post,
    markets: MarketSource::Listing(markets),
    app_error,
    version_gates: &[
        (Operation::Bid, "v1"),
        (Operation::Ask, "v1"),
        (Operation::OrderStatus, "v1"),
        (Operation::OpenOrders, "v1"),
        (Operation::CancelOrder, "v1"),
        (Operation::Wallet, "v1"),
    ],
    route,
    formatters: &[
        (Operation::Ticker, ticker),
        (Operation::OrderBook, order_book),
        (Operation::Trades, trades),
        (Operation::Bid, placed),
        (Operation::Ask, placed),
        (Operation::OrderStatus, status),
        (Operation::OpenOrders, open_orders),
        (Operation::CancelOrder, placed),
        (Operation::Wallet, wallet),
    ],
};

fn uri(version: &str, endpoint: &str) -> String {
    format!("/{}/{}", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new(format!("pubticker/{}", pair)),
        Call::OrderBook { pair } => Route::new(format!("book/{}", pair)),
        Call::Trades { pair } => Route::new(format!("trades/{}", pair)),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("order/new")
            .param("symbol", pair)
            .param("amount", size)
            .param("price", price)
            .param("side", side)
            .param("type", "exchange limit")
            .param("exchange", "bitfinex"),
        Call::OrderStatus { order_id } => Route::new("order/status").param("order_id", order_id),
        Call::OpenOrders => Route::new("orders"),
        Call::CancelOrder { order_id } => Route::new("order/cancel").param("order_id", order_id),
        Call::Wallet => Route::new("balances"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("symbols"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::array(value, "symbols")?
        .iter()
        .map(|symbol| n::text(symbol).ok_or_else(|| format!("bad symbol: {}", symbol)))
        .collect()
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(value, ["bid", "ask", "last_price", "high", "low", "volume"])
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(value, ["tid", "price", "amount", "type", "timestamp"])
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, if value.get("order_id").is_some() { "order_id" } else { "id" })
}

fn parse_order(entry: &Value) -> Result<OrderStatus, String> {
    let live = entry.get("is_live").and_then(Value::as_bool).unwrap_or(false);
    let canceled = entry.get("is_cancelled").and_then(Value::as_bool).unwrap_or(false);
    let state = infer_state(
        live,
        canceled,
        n::opt_num(entry, "original_amount"),
        n::opt_num(entry, "executed_amount"),
    );
    order_status(
        entry,
        ["id", "side", "price", "original_amount", "executed_amount"],
        state,
    )
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

/// Only the exchange wallet is tradable.
fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    let exchange: Vec<Value> = n::array(value, "balances")?
        .iter()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("exchange"))
        .cloned()
        .collect();
    n::wallet_list(&Value::Array(exchange), "currency", "available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::types::{OrderState, Side};
    use serde_json::json;

    #[test]
    fn test_dict_levels() {
        let value = json!({
            "bids": [{"price": "574.61", "amount": "0.1439327", "timestamp": "1472506127.0"}],
            "asks": [{"price": "574.62", "amount": "19.1334", "timestamp": "1472506126.0"}]
        });
        let result = order_book("btcusd", &value).expect("book");
        let book = result.as_order_book().expect("book variant");
        assert_eq!(book.bids[0].price, 574.61);
        assert_eq!(book.asks[0].amount, 19.1334);
    }

    #[test]
    fn test_wallet_uses_exchange_balances() {
        let value = json!([
            {"type": "deposit", "currency": "btc", "amount": "1.0", "available": "1.0"},
            {"type": "exchange", "currency": "btc", "amount": "0.5", "available": "0.5"},
            {"type": "exchange", "currency": "usd", "amount": "1", "available": "0.0"}
        ]);
        let result = wallet("", &value).expect("wallet");
        assert_eq!(result.to_value(), json!({"BTC": 0.5}));
    }

    #[test]
    fn test_order_status_inferred_from_flags() {
        let value = json!({
            "id": 448411365, "side": "buy", "price": "0.02", "is_live": false,
            "is_cancelled": false, "original_amount": "0.02", "executed_amount": "0.02"
        });
        let result = status("", &value).expect("status");
        let status = result.as_order_status().expect("status variant");
        assert_eq!(status.order_id, "448411365");
        assert_eq!(status.state, OrderState::Filled);
        assert_eq!(status.side, Some(Side::Buy));
    }

    #[test]
    fn test_app_error_message() {
        assert_eq!(
            app_error(&json!({"message": "Invalid order: not enough balance"})).as_deref(),
            Some("Invalid order: not enough balance")
        );
        assert!(app_error(&json!([])).is_none());
    }
}
