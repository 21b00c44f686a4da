//! Bitstamp
//!
//! Signature over `nonce + customer_id + key`, sent as form fields next to
//! the payload. Every v2 path ends with a slash.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{
    Operation, OrderState, OrderStatus, Response, Side, WalletBalances,
};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Bitstamp",
    base_url: "https://www.bitstamp.net",
    default_version: "v2",
    uri,
    pair_format: PairFormat::joined("", SymbolCase::Lower),
    scheme: SignScheme::CustomerNonce,
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
        (Operation::CancelOrder, placed),
        (Operation::Wallet, wallet),
    ],
};

fn uri(version: &str, endpoint: &str) -> String {
    format!("/api/{}/{}/", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new(format!("ticker/{}", pair)),
        Call::OrderBook { pair } => Route::new(format!("order_book/{}", pair)),
        Call::Trades { pair } => Route::new(format!("transactions/{}", pair)),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new(format!("{}/{}", side, pair))
            .param("amount", size)
            .param("price", price),
        Call::OrderStatus { order_id } => Route::new("order_status").param("id", order_id),
        Call::OpenOrders => Route::new("open_orders/all"),
        Call::CancelOrder { order_id } => Route::new("cancel_order").param("id", order_id),
        Call::Wallet => Route::new("balance"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("trading-pairs-info"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let reason = value.get("reason").map(Value::to_string).unwrap_or_default();
        return Some(reason);
    }
    value.get("error").map(|error| match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::symbols(value, "url_symbol")
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(value, ["bid", "ask", "last", "high", "low", "volume"])
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

/// `type` is 0 for buy and 1 for sell.
fn trades(_: &str, value: &Value) -> Result<Response, String> {
    let Response::Trades(mut trades) = n::trades(value, ["tid", "price", "amount", "", "date"])? else {
        return Err("unexpected trades shape".to_string());
    };
    for (trade, entry) in trades.iter_mut().zip(n::array(value, "trades")?) {
        trade.side = match entry.get("type").and_then(n::number).map(|t| t as i64) {
            Some(0) => Some(Side::Buy),
            Some(1) => Some(Side::Sell),
            _ => None,
        };
    }
    Ok(Response::Trades(trades))
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "id")
}

fn state(value: &Value) -> OrderState {
    match value.get("status").and_then(Value::as_str).unwrap_or_default() {
        "Open" => OrderState::Open,
        "In Queue" => OrderState::Open,
        "Finished" => OrderState::Filled,
        "Canceled" => OrderState::Canceled,
        other => OrderState::Unknown(other.to_string()),
    }
}

/// Order status only reports the state and the fills so far.
fn status(_: &str, value: &Value) -> Result<Response, String> {
    let filled = n::array(n::field(value, "transactions")?, "transactions")?
        .iter()
        .filter_map(|fill| fill.get("amount").and_then(n::number))
        .sum::<f64>();
    let mut status = order_status(value, ["id", "", "", "", ""], state(value))?;
    status.filled = Some(filled);
    Ok(Response::OrderStatus(status))
}

/// Open orders carry `type` 0 (buy) or 1 (sell).
fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(value, "open orders")?
        .iter()
        .map(|entry| -> Result<OrderStatus, String> {
            let mut status = order_status(entry, ["id", "", "price", "amount", ""], OrderState::Open)?;
            status.side = match entry.get("type").and_then(n::number).map(|t| t as i64) {
                Some(0) => Some(Side::Buy),
                Some(1) => Some(Side::Sell),
                _ => None,
            };
            Ok(status)
        })
        .collect::<Result<Vec<_>, String>>()
        .map(Response::Orders)
}

/// Balances arrive flat as `btc_available`, `btc_balance`, `btc_reserved`.
fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "expected balance object".to_string())?;
    Ok(Response::Wallet(
        object
            .iter()
            .filter_map(|(key, amount)| {
                let currency = key.strip_suffix("_available")?;
                Some((currency.to_uppercase(), n::number(amount)?))
            })
            .collect::<WalletBalances>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uri_has_trailing_slash() {
        assert_eq!(uri("v2", "ticker/btcusd"), "/api/v2/ticker/btcusd/");
    }

    #[test]
    fn test_order_route_embeds_side_and_pair() {
        let route = route(&Call::Order {
            pair: "btcusd",
            side: Side::Sell,
            price: 9000.0,
            size: 0.25,
        })
        .expect("route");
        assert_eq!(route.endpoint, "sell/btcusd");
        assert_eq!(
            route.params,
            vec![
                ("amount".to_string(), "0.25".to_string()),
                ("price".to_string(), "9000".to_string())
            ]
        );
    }

    #[test]
    fn test_wallet_reads_available_keys() {
        let value = json!({
            "btc_available": "0.50000000", "btc_balance": "0.75000000", "btc_reserved": "0.25",
            "usd_available": "0.00", "fee": "0.25"
        });
        let result = wallet("", &value).expect("wallet");
        assert_eq!(result.to_value(), json!({"BTC": 0.5}));
    }

    #[test]
    fn test_trades_side_from_type_code() {
        let value = json!([
            {"date": "1499827319", "tid": 1, "price": "2400.00", "type": 0, "amount": "0.1"},
            {"date": "1499827320", "tid": 2, "price": "2401.00", "type": "1", "amount": "0.2"}
        ]);
        let result = trades("btcusd", &value).expect("trades");
        let trades = result.as_trades().expect("trades variant");
        assert_eq!(trades[0].side, Some(Side::Buy));
        assert_eq!(trades[1].side, Some(Side::Sell));
        assert_eq!(trades[0].timestamp, Some(1499827319));
    }

    #[test]
    fn test_error_status() {
        let err = app_error(&json!({"status": "error", "reason": {"__all__": ["Minimum order size is 5.0 EUR."]}}));
        assert!(err.expect("error").contains("Minimum order size"));
        assert!(app_error(&json!({"id": 1})).is_none());
    }
}
