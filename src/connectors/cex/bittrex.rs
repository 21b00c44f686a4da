//! Bittrex
//!
//! Key and nonce ride in the query string; the full URL is signed with
//! HMAC-SHA512 and sent in `apisign`. Every payload is wrapped in
//! `{"success", "message", "result"}`.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, infer_state, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderStatus, Response, Side};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Bittrex",
    base_url: "https://bittrex.com",
    default_version: "v1.1",
    uri,
    pair_format: PairFormat::reversed("-", SymbolCase::Upper),
    scheme: SignScheme::SignedUri {
        mac: MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Hex),
        key_param: "apikey",
        nonce_param: "nonce",
        signature_header: "apisign",
        sign_full_url: true,
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
        (Operation::Bid, placed),
        (Operation::Ask, placed),
        (Operation::OrderStatus, status),
        (Operation::OpenOrders, open_orders),
        (Operation::Wallet, wallet),
    ],
};

fn uri(version: &str, endpoint: &str) -> String {
    format!("/api/{}/{}", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new("public/getmarketsummary").param("market", pair),
        Call::OrderBook { pair } => Route::new("public/getorderbook")
            .param("market", pair)
            .param("type", "both"),
        Call::Trades { pair } => Route::new("public/getmarkethistory").param("market", pair),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new(match side {
            Side::Buy => "market/buylimit",
            Side::Sell => "market/selllimit",
        })
        .param("market", pair)
        .param("quantity", size)
        .param("rate", price),
        Call::OrderStatus { order_id } => Route::new("account/getorder").param("uuid", order_id),
        Call::OpenOrders => Route::new("market/getopenorders"),
        Call::CancelOrder { order_id } => Route::new("market/cancel").param("uuid", order_id),
        Call::Wallet => Route::new("account/getbalances"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("public/getmarkets"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    match value.get("success").and_then(Value::as_bool) {
        Some(false) => Some(
            value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
        ),
        _ => None,
    }
}

fn result(value: &Value) -> Result<&Value, String> {
    n::field(value, "result")
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::symbols(result(value)?, "MarketName")
}

/// The summary endpoint answers with a list; pick the requested market.
fn ticker(pair: &str, value: &Value) -> Result<Response, String> {
    let summary = n::array(result(value)?, "market summaries")?
        .iter()
        .find(|item| item.get("MarketName").and_then(Value::as_str) == Some(pair))
        .ok_or_else(|| format!("no summary for {}", pair))?;
    n::ticker(summary, ["Bid", "Ask", "Last", "High", "Low", "Volume"])
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book_keyed(result(value)?, ("buy", "sell"), ("Rate", "Quantity"))
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(result(value)?, ["Id", "Price", "Quantity", "OrderType", "TimeStamp"])
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(result(value)?, "uuid")
}

fn parse_order(entry: &Value) -> Result<OrderStatus, String> {
    let amount = n::opt_num(entry, "Quantity");
    let remaining = n::opt_num(entry, "QuantityRemaining");
    let filled = amount.zip(remaining).map(|(total, left)| total - left);
    let open = entry.get("IsOpen").and_then(Value::as_bool).unwrap_or(true);
    let canceled = entry
        .get("CancelInitiated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let id_key = if entry.get("OrderUuid").is_some() { "OrderUuid" } else { "Uuid" };
    let type_key = if entry.get("OrderType").is_some() { "OrderType" } else { "Type" };
    let mut status = order_status(
        entry,
        [id_key, type_key, "Limit", "Quantity", ""],
        infer_state(open, canceled, amount, filled),
    )?;
    status.filled = filled;
    Ok(status)
}

fn status(_: &str, value: &Value) -> Result<Response, String> {
    parse_order(result(value)?).map(Response::OrderStatus)
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(result(value)?, "open orders")?
        .iter()
        .map(parse_order)
        .collect::<Result<Vec<_>, _>>()
        .map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(result(value)?, "Currency", "Available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::types::OrderState;
    use serde_json::json;

    fn envelope(result: Value) -> Value {
        json!({"success": true, "message": "", "result": result})
    }

    #[test]
    fn test_ticker_selects_market_name() {
        let value = envelope(json!([
            {"MarketName": "BTC-ETH", "Bid": 0.07, "Ask": 0.071, "Last": 0.0705},
            {"MarketName": "USDT-BTC", "Bid": "2400.1", "Ask": "2401", "Last": "2400.5", "Volume": "10"}
        ]));
        let result = ticker("USDT-BTC", &value).expect("ticker");
        let ticker = result.as_ticker().expect("ticker variant");
        assert_eq!(ticker.bid, 2400.1);
        assert_eq!(ticker.volume, Some(10.0));
        assert!(super::ticker("BTC-LTC", &value).is_err());
    }

    #[test]
    fn test_order_book_remaps_buy_sell() {
        let value = envelope(json!({
            "buy": [{"Quantity": 12.4, "Rate": 32.5}],
            "sell": [{"Quantity": "1.5", "Rate": "33.0"}]
        }));
        let result = order_book("BTC-LTC", &value).expect("book");
        assert_eq!(
            result.to_value(),
            json!({"bids": [{"price": 32.5, "amount": 12.4}], "asks": [{"price": 33.0, "amount": 1.5}]})
        );
    }

    #[test]
    fn test_order_fill_from_remaining() {
        let value = envelope(json!({
            "OrderUuid": "0cb4c4e4-bdc7-4e13-8c13-430e587d2cc1", "Type": "LIMIT_BUY",
            "Quantity": 1.0, "QuantityRemaining": 0.25, "Limit": 0.0001, "IsOpen": true,
            "CancelInitiated": false
        }));
        let result = status("", &value).expect("status");
        let status = result.as_order_status().expect("status variant");
        assert_eq!(status.state, OrderState::PartiallyFilled);
        assert_eq!(status.filled, Some(0.75));
        assert_eq!(status.side, Some(Side::Buy));
    }

    #[test]
    fn test_failure_envelope() {
        assert_eq!(
            app_error(&json!({"success": false, "message": "APIKEY_INVALID", "result": null})).as_deref(),
            Some("APIKEY_INVALID")
        );
        assert!(app_error(&envelope(json!([]))).is_none());
    }
}
