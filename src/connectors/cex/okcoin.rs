//! OKCoin and OKEX
//!
//! Both run the same v1 `*.do` API: public calls are GET, private calls
//! POST a form signed with an uppercase MD5 over the sorted parameters and
//! the secret. Only the host and the tradable pairs differ.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::SignScheme;
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, OrderStatus, Response};

const FORMATTERS: &[(Operation, super::Formatter)] = &[
    (Operation::Ticker, ticker),
    (Operation::OrderBook, order_book),
    (Operation::Trades, trades),
    (Operation::Bid, placed),
    (Operation::Ask, placed),
    (Operation::OrderStatus, status),
    (Operation::OpenOrders, open_orders),
    (Operation::CancelOrder, placed),
    (Operation::Wallet, wallet),
    (Operation::Withdraw, withdrawn),
];

pub static OKCOIN: BackendSpec = okcoin();

pub static OKEX: BackendSpec = BackendSpec {
    name: "OKEX",
    base_url: "https://www.okex.com",
    markets: MarketSource::Static(&[
        "ltc_btc", "eth_btc", "etc_btc", "btc_btc", "xrp_btc", "xem_btc", "xlm_btc",
        "iota_btc", "1st_btc", "aac_btc",
    ]),
    ..okcoin()
};

const fn okcoin() -> BackendSpec {
    BackendSpec {
        name: "OKCoin",
        base_url: "https://www.okcoin.com",
        default_version: "v1",
        uri,
        pair_format: PairFormat::joined("_", SymbolCase::Lower),
        scheme: SignScheme::SortedMd5,
        nonce_unit: NonceUnit::Millis,
        public_method: Method::Get,
        private_method: Method::Post,
        markets: MarketSource::Static(&[
            "btc_usd", "ltc_usd", "eth_usd", "btc_cny", "ltc_cny", "eth_cny",
        ]),
        app_error,
        version_gates: &[],
        route,
        formatters: FORMATTERS,
    }
}

fn uri(version: &str, endpoint: &str) -> String {
    format!("/api/{}/{}", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new("ticker.do").param("symbol", pair),
        Call::OrderBook { pair } => Route::new("depth.do").param("symbol", pair),
        Call::Trades { pair } => Route::new("trades.do").param("symbol", pair),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("trade.do")
            .param("symbol", pair)
            .param("type", side)
            .param("price", price)
            .param("amount", size),
        Call::OrderStatus { order_id } => Route::new("order_info.do").param("order_id", order_id),
        // order id -1 lists every unfilled order
        Call::OpenOrders => Route::new("order_info.do").param("order_id", -1),
        Call::CancelOrder { order_id } => Route::new("cancel_order.do").param("order_id", order_id),
        Call::Wallet => Route::new("userinfo.do"),
        Call::Withdraw {
            currency,
            amount,
            address,
        } => Route::new("withdraw.do")
            .param("symbol", currency)
            .param("withdraw_address", address)
            .param("withdraw_amount", amount),
        Call::Markets => return None,
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    if value.get("result").and_then(Value::as_bool) == Some(false) {
        let code = value.get("error_code").map(Value::to_string).unwrap_or_default();
        return Some(format!("error_code {}", code));
    }
    value
        .get("error_code")
        .map(|code| format!("error_code {}", code))
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(n::field(value, "ticker")?, ["buy", "sell", "last", "high", "low", "vol"])
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(value, ["tid", "price", "amount", "type", "date"])
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "order_id")
}

fn withdrawn(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "withdraw_id")
}

/// Status codes: -1 canceled, 0 open, 1 partially filled, 2 filled,
/// 3 cancel in progress.
fn parse_order(entry: &Value) -> Result<OrderStatus, String> {
    let state = match entry.get("status").and_then(Value::as_i64) {
        Some(-1) => OrderState::Canceled,
        Some(0) => OrderState::Open,
        Some(1) => OrderState::PartiallyFilled,
        Some(2) => OrderState::Filled,
        Some(3) => OrderState::Canceled,
        other => OrderState::Unknown(other.map(|code| code.to_string()).unwrap_or_default()),
    };
    order_status(entry, ["order_id", "type", "price", "amount", "deal_amount"], state)
}

fn orders(value: &Value) -> Result<Vec<OrderStatus>, String> {
    n::array(n::field(value, "orders")?, "orders")?
        .iter()
        .map(parse_order)
        .collect()
}

fn status(_: &str, value: &Value) -> Result<Response, String> {
    orders(value)?
        .into_iter()
        .next()
        .map(Response::OrderStatus)
        .ok_or_else(|| "order not found".to_string())
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    orders(value).map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_map(n::path(value, &["info", "funds", "free"])?)
}
