//! Canonical types shared by every backend
//!
//! These types give one representation of market and account data
//! regardless of which exchange produced it. Numeric fields are always
//! `f64`, even when the backend sends them as strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Uniform operations exposed by every exchange interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Ticker,
    OrderBook,
    Trades,
    Bid,
    Ask,
    OrderStatus,
    OpenOrders,
    CancelOrder,
    Wallet,
    Withdraw,
    /// Market-listing call used to populate the supported pair set
    Markets,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Ticker => "ticker",
            Operation::OrderBook => "order_book",
            Operation::Trades => "trades",
            Operation::Bid => "bid",
            Operation::Ask => "ask",
            Operation::OrderStatus => "order_status",
            Operation::OpenOrders => "open_orders",
            Operation::CancelOrder => "cancel_order",
            Operation::Wallet => "wallet",
            Operation::Withdraw => "withdraw",
            Operation::Markets => "markets",
        }
    }

    /// Private operations are always signed and use the private verb.
    pub fn is_private(&self) -> bool {
        !matches!(
            self,
            Operation::Ticker | Operation::OrderBook | Operation::Trades | Operation::Markets
        )
    }

    /// Operations whose first argument is a trading pair.
    pub fn takes_pair(&self) -> bool {
        matches!(
            self,
            Operation::Ticker
                | Operation::OrderBook
                | Operation::Trades
                | Operation::Bid
                | Operation::Ask
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn operation(&self) -> Operation {
        match self {
            Side::Buy => Operation::Bid,
            Side::Sell => Operation::Ask,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Ticker data for a trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
    /// Last traded price
    pub last: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    /// 24h volume (base currency)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Order book level (price and amount)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub amount: f64,
}

/// Order book snapshot, levels in exchange-reported priority order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBook {
    /// Get the best bid level
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    /// Get the best ask level
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    /// Get the spread
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

/// Public trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub price: f64,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Order lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Unknown(String),
}

/// Canonical order status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub order_id: String,
    pub state: OrderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled: Option<f64>,
}

/// Available balances keyed by currency. Only strictly positive amounts
/// are ever stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletBalances(BTreeMap<String, f64>);

impl WalletBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a balance; zero and negative amounts are dropped.
    pub fn insert(&mut self, currency: impl Into<String>, amount: f64) {
        if amount > 0.0 {
            self.0.insert(currency.into(), amount);
        }
    }

    pub fn get(&self, currency: &str) -> Option<f64> {
        self.0.get(currency).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// Drop anything that is not strictly positive.
    pub fn retain_positive(&mut self) {
        self.0.retain(|_, amount| *amount > 0.0);
    }
}

impl FromIterator<(String, f64)> for WalletBalances {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut wallet = WalletBalances::new();
        for (currency, amount) in iter {
            wallet.insert(currency, amount);
        }
        wallet
    }
}

/// Result of an exchange operation after normalization.
///
/// `Raw` is returned whenever no transform is registered for the
/// backend/operation: it is the basic-decoded JSON payload, unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Raw(Value),
    Ticker(Ticker),
    OrderBook(OrderBook),
    Trades(Vec<Trade>),
    OrderId(String),
    OrderStatus(OrderStatus),
    Orders(Vec<OrderStatus>),
    Wallet(WalletBalances),
}

impl Response {
    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Response::Raw(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ticker(&self) -> Option<&Ticker> {
        match self {
            Response::Ticker(ticker) => Some(ticker),
            _ => None,
        }
    }

    pub fn as_order_book(&self) -> Option<&OrderBook> {
        match self {
            Response::OrderBook(book) => Some(book),
            _ => None,
        }
    }

    pub fn as_trades(&self) -> Option<&[Trade]> {
        match self {
            Response::Trades(trades) => Some(trades),
            _ => None,
        }
    }

    pub fn as_order_id(&self) -> Option<&str> {
        match self {
            Response::OrderId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_order_status(&self) -> Option<&OrderStatus> {
        match self {
            Response::OrderStatus(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_wallet(&self) -> Option<&WalletBalances> {
        match self {
            Response::Wallet(wallet) => Some(wallet),
            _ => None,
        }
    }

    /// JSON rendering of the canonical shape.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Outcome of `cancel_order`: a single result for one id, otherwise one
/// result per id in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelResult {
    One(Response),
    Many(Vec<Response>),
}

impl CancelResult {
    pub fn len(&self) -> usize {
        match self {
            CancelResult::One(_) => 1,
            CancelResult::Many(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Response> {
        match self {
            CancelResult::One(result) => vec![result],
            CancelResult::Many(results) => results,
        }
    }
}

/// Optional parameters for order placement, status and cancellation.
///
/// Entries are merged over the payload the backend builds, replacing any
/// parameter of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderOptions {
    extra: Vec<(String, String)>,
}

impl OrderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.extra.is_empty()
    }
}
