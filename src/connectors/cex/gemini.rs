//! Gemini
//!
//! Same payload scheme as Bitfinex v1 under `X-GEMINI-*` headers, with an
//! empty request body.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, infer_state, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderStatus, Response, Ticker};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Gemini",
    base_url: "https://api.gemini.com",
    default_version: "v1",
    uri,
    pair_format: PairFormat::joined("", SymbolCase::Lower),
    scheme: SignScheme::EncodedPayload {
        mac: MacSpec::new(HashAlgorithm::Sha384, DigestEncoding::Hex),
        header_prefix: "X-GEMINI",
        send_body: false,
        integer_params: &["order_id"],
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
            .param("type", "exchange limit"),
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
    if value.get("result").and_then(Value::as_str) != Some("error") {
        return None;
    }
    value
        .get("message")
        .or_else(|| value.get("reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some("request failed".to_string()))
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::array(value, "symbols")?
        .iter()
        .map(|symbol| n::text(symbol).ok_or_else(|| format!("bad symbol: {}", symbol)))
        .collect()
}

/// Volume is keyed by the base currency inside a nested object.
fn ticker(pair: &str, value: &Value) -> Result<Response, String> {
    let volume = value.get("volume").and_then(|volume| {
        volume
            .as_object()?
            .iter()
            .find(|(currency, _)| pair.starts_with(&currency.to_lowercase()))
            .and_then(|(_, amount)| n::number(amount))
    });
    Ok(Response::Ticker(Ticker {
        bid: n::num_field(value, "bid")?,
        ask: n::num_field(value, "ask")?,
        last: n::num_field(value, "last")?,
        high: None,
        low: None,
        volume,
    }))
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(value, ["tid", "price", "amount", "type", "timestampms"])
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "order_id")
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
        ["order_id", "side", "price", "original_amount", "executed_amount"],
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

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(value, "currency", "available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticker_volume_for_base_currency() {
        let value = json!({
            "bid": "977.59", "ask": "977.35", "last": "977.65",
            "volume": {"BTC": "2210.505328803", "USD": "2135477.463379586263", "timestamp": 1483018200000u64}
        });
        let result = ticker("btcusd", &value).expect("ticker");
        let ticker = result.as_ticker().expect("ticker variant");
        assert_eq!(ticker.volume, Some(2210.505328803));
        assert_eq!(ticker.bid, 977.59);
    }

    #[test]
    fn test_error_result() {
        assert_eq!(
            app_error(&json!({"result": "error", "reason": "InvalidSignature", "message": "InvalidSignature"}))
                .as_deref(),
            Some("InvalidSignature")
        );
        assert!(app_error(&json!({"order_id": "1"})).is_none());
    }

    #[test]
    fn test_trades_use_millisecond_timestamp() {
        let value = json!([{"timestamp": 1420088400, "timestampms": 1420088400122u64, "tid": 155814,
            "price": "822.12", "amount": "12.10", "type": "buy"}]);
        let result = trades("btcusd", &value).expect("trades");
        assert_eq!(result.as_trades().expect("trades")[0].timestamp, Some(1420088400));
    }
}
