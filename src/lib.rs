//! bitex: one REST contract over many crypto exchanges
//!
//! ```no_run
//! use bitex::{Backend, CanonicalPair, ClientConfig, ExchangeInterface};
//!
//! # async fn run() -> Result<(), bitex::ConnectorError> {
//! let kraken = ExchangeInterface::new(Backend::Kraken, ClientConfig::new())?;
//! let book = kraken.order_book(CanonicalPair::new("BTC", "USD")).await?;
//! println!("{}", book.to_value());
//! # Ok(())
//! # }
//! ```

pub mod connectors;

pub use connectors::{
    Backend, CanonicalPair, CancelResult, ClientConfig, ConnectorError, ExchangeInterface,
    OrderOptions, Response, ResponseNormalizer,
};
