//! Exchange Connectors for bitex
//!
//! This module provides one uniform interface over many cryptocurrency
//! exchange REST APIs. Every backend exposes the same operations:
//! - Market data (ticker, order book, trades)
//! - Order management (bid/ask, order status, open orders, cancel)
//! - Account management (wallet balances, withdrawals)
//!
//! Backends are data ([`cex::BackendSpec`] records), not types: an
//! [`ExchangeInterface`] runs the same validate, sign, execute and
//! normalize pipeline for all of them.

pub mod auth;
pub mod cex;
pub mod client;
pub mod error;
pub mod interface;
pub mod nonce;
pub mod normalize;
pub mod pairs;
pub mod signing;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used items
pub use auth::ApiCredentials;
pub use cex::Backend;
pub use client::{BackendClient, ClientConfig};
pub use error::ConnectorError;
pub use interface::ExchangeInterface;
pub use nonce::{NonceSource, NonceUnit};
pub use normalize::ResponseNormalizer;
pub use pairs::{CanonicalPair, PairInput, SupportedPairs};
pub use transport::{HttpTransport, Method, RawResponse, SignedRequest, Transport};
pub use types::*;
