//! Poloniex
//!
//! Every call names a `command`: public ones go to `GET /public`, private
//! ones are form POSTs to `/tradingApi` signed with HMAC-SHA512 over the
//! body. Order placement is not offered through this adapter.

use serde_json::Value;

use super::{BackendSpec, Call, MarketSource, Route};
use crate::connectors::auth::{DigestEncoding, HashAlgorithm};
use crate::connectors::nonce::NonceUnit;
use crate::connectors::normalize::{self as n, order_status};
use crate::connectors::pairs::{PairFormat, SymbolCase};
use crate::connectors::signing::{MacSpec, SignScheme};
use crate::connectors::transport::Method;
use crate::connectors::types::{Operation, OrderState, OrderStatus, Response};

pub static SPEC: BackendSpec = BackendSpec {
    name: "Poloniex",
    base_url: "https://poloniex.com",
    default_version: "",
    uri,
    pair_format: PairFormat::reversed("_", SymbolCase::Upper),
    scheme: SignScheme::FormBody {
        mac: MacSpec::new(HashAlgorithm::Sha512, DigestEncoding::Hex),
        key_header: "Key",
        signature_header: "Sign",
    },
    nonce_unit: NonceUnit::Micros,
    public_method: Method::Get,
    private_method: Method::Post,
    markets: MarketSource::Static(&[
        "BTC_AMP", "BTC_ARDR", "BTC_BCH", "BTC_BCN", "BTC_BCY", "BTC_BELA", "BTC_BLK",
        "BTC_BTCD", "BTC_BTM", "BTC_BTS", "BTC_BURST", "BTC_CLAM", "BTC_CVC", "BTC_DASH",
        "BTC_DCR", "BTC_DGB", "BTC_DOGE", "BTC_EMC2", "BTC_ETC", "BTC_ETH", "BTC_EXP",
        "BTC_FCT", "BTC_FLDC", "BTC_FLO", "BTC_GAME", "BTC_GAS", "BTC_GNO", "BTC_GNT",
        "BTC_GRC", "BTC_HUC", "BTC_LBC", "BTC_LSK", "BTC_LTC", "BTC_MAID", "BTC_NAV",
        "BTC_NEOS", "BTC_NMC", "BTC_NXC", "BTC_NXT", "BTC_OMG", "BTC_OMNI", "BTC_PASC",
        "BTC_PINK", "BTC_POT", "BTC_PPC", "BTC_RADS", "BTC_REP", "BTC_RIC", "BTC_SBD",
        "BTC_SC", "BTC_STEEM", "BTC_STORJ", "BTC_STR", "BTC_STRAT", "BTC_SYS", "BTC_VIA",
        "BTC_VRC", "BTC_VTC", "BTC_XBC", "BTC_XCP", "BTC_XEM", "BTC_XMR", "BTC_XPM",
        "BTC_XRP", "BTC_XVC", "BTC_ZEC", "BTC_ZRX", "ETH_BCH", "ETH_CVC", "ETH_ETC",
        "ETH_GAS", "ETH_GNO", "ETH_GNT", "ETH_LSK", "ETH_OMG", "ETH_REP", "ETH_STEEM",
        "ETH_ZEC", "ETH_ZRX", "USDT_BCH", "USDT_BTC", "USDT_DASH", "USDT_ETC", "USDT_ETH",
        "USDT_LTC", "USDT_NXT", "USDT_REP", "USDT_STR", "USDT_XMR", "USDT_XRP", "USDT_ZEC",
        "XMR_BCN", "XMR_BLK", "XMR_BTCD", "XMR_DASH", "XMR_LTC", "XMR_MAID", "XMR_NXT",
        "XMR_ZEC",
    ]),
    app_error,
    version_gates: &[],
    route,
    formatters: &[
        (Operation::Ticker, ticker),
        (Operation::OrderBook, order_book),
        (Operation::Trades, trades),
        (Operation::OpenOrders, open_orders),
        (Operation::Wallet, wallet),
    ],
};

fn uri(_: &str, endpoint: &str) -> String {
    format!("/{}", endpoint)
}

fn public(command: &str) -> Route {
    Route::new("public").param("command", command)
}

fn trading(command: &str) -> Route {
    Route::new("tradingApi").param("command", command)
}

fn route(call: &Call<'_>) -> Option<Route> {
    let route = match *call {
        // returnTicker answers for every pair at once
        Call::Ticker { .. } => public("returnTicker"),
        Call::OrderBook { pair } => public("returnOrderBook").param("currencyPair", pair),
        Call::Trades { pair } => public("returnTradeHistory").param("currencyPair", pair),
        Call::Order { .. } | Call::Withdraw { .. } | Call::Markets => return None,
        Call::OrderStatus { order_id } => {
            trading("returnOrderTrades").param("orderNumber", order_id)
        }
        Call::OpenOrders => trading("returnOpenOrders").param("currencyPair", "all"),
        Call::CancelOrder { order_id } => trading("cancelOrder").param("orderNumber", order_id),
        Call::Wallet => trading("returnBalances"),
    };
    Some(route)
}

fn app_error(value: &Value) -> Option<String> {
    value.get("error").map(|error| {
        error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string())
    })
}

fn ticker(pair: &str, value: &Value) -> Result<Response, String> {
    n::ticker(
        n::field(value, pair)?,
        ["highestBid", "lowestAsk", "last", "high24hr", "low24hr", "baseVolume"],
    )
}

fn order_book(_: &str, value: &Value) -> Result<Response, String> {
    n::book(value, "bids", "asks")
}

fn trades(_: &str, value: &Value) -> Result<Response, String> {
    n::trades(value, ["tradeID", "rate", "amount", "type", "date"])
}

/// Open orders come grouped by pair; listed orders are open by definition.
fn open_orders(_: &str, value: &Value) -> Result<Response, String> {
    let by_pair = value
        .as_object()
        .ok_or_else(|| "expected orders keyed by pair".to_string())?;
    let mut orders = Vec::new();
    for entries in by_pair.values() {
        for entry in n::array(entries, "orders")? {
            orders.push(parse_open(entry)?);
        }
    }
    Ok(Response::Orders(orders))
}

fn parse_open(entry: &Value) -> Result<OrderStatus, String> {
    let mut status = order_status(entry, ["orderNumber", "type", "rate", "amount", ""], OrderState::Open)?;
    // `amount` is what remains, so a reduced `startingAmount` means a partial fill
    if let Some(starting) = n::opt_num(entry, "startingAmount") {
        let remaining = status.amount.unwrap_or(starting);
        if remaining < starting {
            status.state = OrderState::PartiallyFilled;
            status.filled = Some(starting - remaining);
        }
        status.amount = Some(starting);
    }
    Ok(status)
}

fn wallet(_: &str, value: &Value) -> Result<Response, String> {
    n::wallet_map(value)
}
