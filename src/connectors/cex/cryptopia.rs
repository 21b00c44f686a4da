//! Cryptopia
//!
//! Private calls POST a JSON body and authenticate with an `amx` header.
//! Responses are wrapped in `{"Success", "Error", "Data"}`. Order status
//! lookup has no endpoint.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, Response, Side};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Cryptopia",
    base_url: "https://www.cryptopia.co.nz",
    default_version: "v1",
    uri,
    pair_format: PairFormat::joined("_", SymbolCase::Upper),
    scheme: SignScheme::Amx,
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
        (Operation::OpenOrders, open_orders),
        (Operation::Wallet, wallet),
    ],
};

/// The API is unversioned.
fn uri(_: &str, endpoint: &str) -> String {
    format!("/api/{}", endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new(format!("GetMarket/{}", pair)),
        Call::OrderBook { pair } => Route::new(format!("GetMarketOrders/{}", pair)),
        Call::Trades { pair } => Route::new(format!("GetMarketHistory/{}", pair)),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("SubmitTrade")
            .param("Market", pair)
            .param(
                "Type",
                match side {
                    Side::Buy => "Buy",
                    Side::Sell => "Sell",
                },
            )
            .param("Rate", price)
            .param("Amount", size),
        Call::OrderStatus { .. } => return None,
        Call::OpenOrders => Route::new("GetOpenOrders"),
        Call::CancelOrder { order_id } => Route::new("CancelTrade")
            .param("Type", "Trade")
            .param("OrderId", order_id),
        Call::Wallet => Route::new("GetBalance"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("GetTradePairs"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    match value.get("Success").and_then(Value::as_bool) {
        Some(false) => Some(
            value
                .get("Error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
        ),
        _ => None,
    }
}

fn data(value: &Value) -> Result<&Value, String> {
    n::field(value, "Data")
}

/// Labels are `BASE/QUOTE`; symbols use an underscore.
fn markets(value: &Value) -> Result<Vec<String>, String> {
    Ok(n::symbols(data(value)?, "Label")?
        .into_iter()
        .map(|label| label.replace('/', "_"))
        .collect())
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(
        data(value)?,
        ["BidPrice", "AskPrice", "LastPrice", "High", "Low", "Volume"],
    )
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book_keyed(data(value)?, ("Buy", "Sell"), ("Price", "Volume"))
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(data(value)?, ["", "Price", "Amount", "Type", "Timestamp"])
}

/// Orders filled immediately have no `OrderId`; report the first fill.
fn placed(_: &str, value: &Value) -> Result<Response, String> {
    let data = data(value)?;
    match data.get("OrderId").and_then(n::text) {
        Some(id) => Ok(Response::OrderId(id)),
        None => n::array(n::field(data, "FilledOrders")?, "filled orders")?
            .first()
            .and_then(n::text)
            .map(Response::OrderId)
            .ok_or_else(|| "no order id in response".to_string()),
    }
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(data(value)?, "open orders")?
        .iter()
        .map(|entry| {
            let amount = n::opt_num(entry, "Amount");
            let remaining = n::opt_num(entry, "Remaining");
            let filled = amount.zip(remaining).map(|(total, left)| total - left);
            let state = if filled.unwrap_or(0.0) > 0.0 {
                OrderState::PartiallyFilled
            } else {
                OrderState::Open
            };
            order_status(entry, ["OrderId", "Type", "Rate", "Amount", ""], state).map(
                |mut status| {
                    status.filled = filled;
                    status
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(data(value)?, "Symbol", "Available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markets_replace_slash() {
        let value = json!({"Success": true, "Error": null, "Data": [
            {"Id": 100, "Label": "DOT/BTC"}, {"Id": 101, "Label": "LTC/USDT"}
        ]});
        assert_eq!(
            markets(&value).expect("markets"),
            vec!["DOT_BTC".to_string(), "LTC_USDT".to_string()]
        );
    }

    #[test]
    fn test_order_book_from_buy_sell() {
        let value = json!({"Success": true, "Data": {
            "Buy": [{"TradePairId": 100, "Label": "DOT/BTC", "Price": 0.00000317, "Volume": 260.1, "Total": 0.00082}],
            "Sell": [{"TradePairId": 100, "Label": "DOT/BTC", "Price": 0.0000032, "Volume": 12.0, "Total": 0.00004}]
        }});
        let result = order_book("DOT_BTC", &value).expect("book");
        let book = result.as_order_book().expect("book variant");
        assert_eq!(book.bids[0].amount, 260.1);
        assert_eq!(book.asks[0].price, 0.0000032);
    }

    #[test]
    fn test_placed_falls_back_to_fill() {
        let value = json!({"Success": true, "Data": {"OrderId": null, "FilledOrders": [5554, 5555]}});
        assert_eq!(
            placed("DOT_BTC", &value).expect("placed"),
            Response::OrderId("5554".to_string())
        );
    }

    #[test]
    fn test_order_status_is_not_routed() {
        assert!(route(&Call::OrderStatus { order_id: "1" }).is_none());
    }

    #[test]
    fn test_success_flag() {
        assert_eq!(
            app_error(&json!({"Success": false, "Error": "Invalid trade pair", "Data": null})).as_deref(),
            Some("Invalid trade pair")
        );
        assert!(app_error(&json!({"Success": true, "Data": []})).is_none());
    }
}
