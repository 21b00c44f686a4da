//! Binance
//!
//! Query-string HMAC-SHA256 signing with the key in `X-MBX-APIKEY`.
//! Account and order endpoints exist only under `/api/v3`.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{OrderState, Operation, Response, Side};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Binance",
    base_url: "https://api.binance.com",
    default_version: "v3",
    uri,
    pair_format: PairFormat::joined("", SymbolCase::Upper),
    scheme: SignScheme::QueryParam {
        mac: MacSpec::new(HashAlgorithm::Sha256, DigestEncoding::Hex),
        key_header: "X-MBX-APIKEY",
        timestamp_param: "timestamp",
        signature_param: "signature",
    },
    nonce_unit: NonceUnit::Millis,
    public_method: Method::Get,
    private_method: Method::Get,
    markets: MarketSource::Listing(markets),
    app_error,
    version_gates: &[
        (Operation::Bid, "v3"),
        (Operation::Ask, "v3"),
        (Operation::OrderStatus, "v3"),
        (Operation::OpenOrders, "v3"),
        (Operation::CancelOrder, "v3"),
        (Operation::Wallet, "v3"),
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
    format!("/api/{}/{}", version, endpoint)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        Call::Ticker { pair } => Route::new("ticker/24hr").param("symbol", pair),
        Call::OrderBook { pair } => Route::new("depth").param("symbol", pair),
        Call::Trades { pair } => Route::new("trades").param("symbol", pair),
        Call::Order {
            pair,
            side,
            price,
            size,
        } => Route::new("order")
            .param("symbol", pair)
            .param(
                "side",
                match side {
                    Side::Buy => "BUY",
                    Side::Sell => "SELL",
                },
            )
            .param("type", "LIMIT")
            .param("timeInForce", "GTC")
            .param("quantity", size)
            .param("price", price)
            .method(Method::Post),
        Call::OrderStatus { order_id } => Route::new("order").param("orderId", order_id),
        Call::OpenOrders => Route::new("openOrders"),
        Call::CancelOrder { order_id } => Route::new("order")
            .param("orderId", order_id)
            .method(Method::Delete),
        Call::Wallet => Route::new("account"),
        Call::Withdraw { .. } => return None,
        Call::Markets => Route::new("exchangeInfo"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    let code = value.get("code")?.as_i64()?;
    let msg = value.get("msg").and_then(Value::as_str).unwrap_or_default();
    Some(format!("{} (code {})", msg, code))
}

fn markets(value: &Value) -> Result<Vec<String>, String> {
    n::symbols(n::field(value, "symbols")?, "symbol")
}

fn ticker(_: &str, value: &Value) -> Result<Response, String> {
    n::ticker(
        value,
        ["bidPrice", "askPrice", "lastPrice", "highPrice", "lowPrice", "volume"],
    )
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    let Response::Trades(mut trades) = n::trades(value, ["id", "price", "qty", "", "time"])? else {
        return Err("unexpected trades shape".to_string());
    };
    // isBuyerMaker means the aggressor sold
    for (trade, entry) in trades.iter_mut().zip(n::array(value, "trades")?) {
        trade.side = entry.get("isBuyerMaker").and_then(Value::as_bool).map(|maker| {
            if maker {
                Side::Sell
            } else {
                Side::Buy
            }
        });
    }
    Ok(Response::Trades(trades))
}

fn placed(_: &str, value: &Value) -> Result<Response, String> {
    n::order_id(value, "orderId")
}

fn state(value: &Value) -> OrderState {
    match value.get("status").and_then(Value::as_str).unwrap_or_default() {
        "NEW" => OrderState::Open,
        "PARTIALLY_FILLED" => OrderState::PartiallyFilled,
        "FILLED" => OrderState::Filled,
        "CANCELED" | "PENDING_CANCEL" | "EXPIRED" => OrderState::Canceled,
        "REJECTED" => OrderState::Rejected,
        other => OrderState::Unknown(other.to_string()),
    }
}

const ORDER_KEYS: n::OrderKeys<'static> = ["orderId", "side", "price", "origQty", "executedQty"];

fn status(_: &str, value: &Value) -> Result<Response, String> {
    order_status(value, ORDER_KEYS, state(value)).map(Response::OrderStatus)
}

fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    n::array(value, "open orders")?
        .iter()
        .map(|entry| order_status(entry, ORDER_KEYS, state(entry)))
        .collect::<Result<Vec<_>, _>>()
        .map(Response::Orders)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_list(n::field(value, "balances")?, "asset", "free")
}
