//! Uniform exchange interface
//!
//! [`ExchangeInterface`] exposes the same operations for every backend.
//! Each call runs a fixed pipeline:
//!
//! 1. reject operations gated to another API version
//! 2. resolve the backend route (absent routes are `NotImplemented`)
//! 3. require credentials for private operations
//! 4. check the translated pair against the backend's supported set
//! 5. build the request, signed for private operations
//! 6. execute it on the transport
//! 7. decode and normalize the response
//!
//! Steps 1-3 never touch the network, so a call that cannot be served fails
//! without side effects. Step 4 may fetch the market listing once per
//! interface.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::connectors::cex::{Backend, Call, MarketSource, Route};
use crate::connectors::client::{BackendClient, ClientConfig};
use crate::connectors::error::ConnectorError;
use crate::connectors::normalize::ResponseNormalizer;
use crate::connectors::pairs::{PairCache, PairInput, SupportedPairs};
use crate::connectors::transport::{HttpTransport, RawResponse, Transport};
use crate::connectors::types::{CancelResult, Operation, OrderOptions, Response, Side};

/// One backend behind the uniform operation set
pub struct ExchangeInterface {
    client: BackendClient,
    transport: Arc<dyn Transport>,
    normalizer: Arc<ResponseNormalizer>,
    pairs: PairCache,
}

impl ExchangeInterface {
    /// Interface over HTTP with the built-in formatters.
    pub fn new(backend: Backend, config: ClientConfig) -> Result<Self, ConnectorError> {
        let client = BackendClient::new(backend, config)?;
        let transport = HttpTransport::new(client.timeout())?;
        Ok(Self::from_parts(client, Arc::new(transport)))
    }

    /// Interface over a caller-supplied transport.
    pub fn with_transport(
        backend: Backend,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConnectorError> {
        Ok(Self::from_parts(BackendClient::new(backend, config)?, transport))
    }

    fn from_parts(client: BackendClient, transport: Arc<dyn Transport>) -> Self {
        Self {
            client,
            transport,
            normalizer: Arc::new(ResponseNormalizer::with_builtin()),
            pairs: PairCache::new(),
        }
    }

    /// Replace the formatter registry.
    pub fn with_normalizer(mut self, normalizer: Arc<ResponseNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Use `pairs` as the supported set instead of fetching it.
    pub fn with_supported_pairs(self, pairs: SupportedPairs) -> Self {
        self.pairs.seed(pairs);
        self
    }

    pub fn backend(&self) -> Backend {
        self.client.backend()
    }

    pub fn name(&self) -> &'static str {
        self.client.spec().name
    }

    pub fn version(&self) -> &str {
        self.client.version()
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    // =========================================================================
    // Supported Pairs
    // =========================================================================

    /// Backend-native symbols this backend trades. Fetched on first use and
    /// cached for the lifetime of the interface.
    pub async fn supported_pairs(&self) -> Result<&SupportedPairs, ConnectorError> {
        self.pairs.get_or_fetch(|| self.fetch_pairs()).await
    }

    async fn fetch_pairs(&self) -> Result<SupportedPairs, ConnectorError> {
        let backend = self.backend();
        let (symbols, body) = match self.client.spec().markets {
            MarketSource::Static(symbols) => (
                symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                String::new(),
            ),
            MarketSource::Listing(parse) => {
                let route = self.prepare(&Call::Markets)?;
                let raw = self.execute(route, Operation::Markets, &[]).await?;
                let value = self.normalizer.decode(backend, Operation::Markets, &raw)?;
                let symbols = parse(&value).map_err(|message| {
                    self.decode_error(Operation::Markets, message, &raw)
                })?;
                (symbols, raw.body)
            }
        };

        if symbols.is_empty() {
            return Err(ConnectorError::Decode {
                backend: backend.name().to_string(),
                operation: Operation::Markets.name().to_string(),
                message: "empty pair listing".to_string(),
                body,
            });
        }
        info!("{} supports {} pairs", backend, symbols.len());
        Ok(SupportedPairs::new(symbols))
    }

    fn symbol(&self, pair: impl Into<PairInput>) -> String {
        pair.into().symbol_for(self.backend())
    }

    async fn check_pair(&self, symbol: &str) -> Result<(), ConnectorError> {
        if self.supported_pairs().await?.contains(symbol) {
            Ok(())
        } else {
            Err(ConnectorError::UnsupportedPair {
                backend: self.name().to_string(),
                pair: symbol.to_string(),
            })
        }
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Checks that need no network: version gate, route and credentials.
    fn prepare(&self, call: &Call<'_>) -> Result<Route, ConnectorError> {
        let spec = self.client.spec();
        let operation = call.operation();

        if let Some(required) = spec.required_version(operation) {
            if required != self.version() {
                return Err(ConnectorError::UnsupportedEndpoint {
                    backend: self.name().to_string(),
                    operation: operation.name().to_string(),
                    reason: format!(
                        "Method not available on this API version (current is {}, supported is {})",
                        self.version(),
                        required
                    ),
                });
            }
        }

        let route = (spec.route)(call).ok_or_else(|| ConnectorError::NotImplemented {
            backend: self.name().to_string(),
            operation: operation.name().to_string(),
        })?;

        if operation.is_private() && !self.client.has_credentials() {
            return Err(ConnectorError::Configuration(format!(
                "{} requires API credentials for {}",
                self.name(),
                operation
            )));
        }
        Ok(route)
    }

    /// Prepare, pair-check, build and execute `call`.
    async fn send(
        &self,
        call: &Call<'_>,
        extra: &[(String, String)],
    ) -> Result<RawResponse, ConnectorError> {
        let route = self.prepare(call)?;
        let operation = call.operation();
        if operation.takes_pair() {
            self.check_pair(call.pair()).await?;
        }
        self.execute(route, operation, extra).await
    }

    async fn execute(
        &self,
        route: Route,
        operation: Operation,
        extra: &[(String, String)],
    ) -> Result<RawResponse, ConnectorError> {
        let request = self.client.build(route.merge(extra), operation.is_private())?;
        self.transport.execute(request).await
    }

    async fn dispatch(
        &self,
        call: Call<'_>,
        extra: &[(String, String)],
    ) -> Result<Response, ConnectorError> {
        let raw = self.send(&call, extra).await?;
        self.normalizer
            .normalize(self.backend(), call.operation(), call.pair(), &raw)
    }

    fn decode_error(&self, operation: Operation, message: String, raw: &RawResponse) -> ConnectorError {
        ConnectorError::Decode {
            backend: self.name().to_string(),
            operation: operation.name().to_string(),
            message,
            body: raw.body.clone(),
        }
    }

    // =========================================================================
    // Market Data (public)
    // =========================================================================

    /// Best bid/ask and last price, as [`Response::Ticker`].
    #[instrument(skip(self, pair))]
    pub async fn ticker(&self, pair: impl Into<PairInput>) -> Result<Response, ConnectorError> {
        let symbol = self.symbol(pair);
        self.dispatch(Call::Ticker { pair: &symbol }, &[]).await
    }

    /// Order book in exchange order, as [`Response::OrderBook`].
    #[instrument(skip(self, pair))]
    pub async fn order_book(&self, pair: impl Into<PairInput>) -> Result<Response, ConnectorError> {
        let symbol = self.symbol(pair);
        self.dispatch(Call::OrderBook { pair: &symbol }, &[]).await
    }

    /// Recent public trades, as [`Response::Trades`].
    #[instrument(skip(self, pair))]
    pub async fn trades(&self, pair: impl Into<PairInput>) -> Result<Response, ConnectorError> {
        let symbol = self.symbol(pair);
        self.dispatch(Call::Trades { pair: &symbol }, &[]).await
    }

    // =========================================================================
    // Trading (private)
    // =========================================================================

    /// Place a limit buy order; returns [`Response::OrderId`].
    pub async fn bid(
        &self,
        pair: impl Into<PairInput>,
        price: f64,
        size: f64,
    ) -> Result<Response, ConnectorError> {
        self.place_order(Side::Buy, pair, price, size, &OrderOptions::new())
            .await
    }

    /// Place a limit sell order; returns [`Response::OrderId`].
    pub async fn ask(
        &self,
        pair: impl Into<PairInput>,
        price: f64,
        size: f64,
    ) -> Result<Response, ConnectorError> {
        self.place_order(Side::Sell, pair, price, size, &OrderOptions::new())
            .await
    }

    /// Place a limit order, merging `options` over the backend payload.
    #[instrument(skip(self, pair))]
    pub async fn place_order(
        &self,
        side: Side,
        pair: impl Into<PairInput>,
        price: f64,
        size: f64,
        options: &OrderOptions,
    ) -> Result<Response, ConnectorError> {
        if !(price.is_finite() && price > 0.0 && size.is_finite() && size > 0.0) {
            return Err(ConnectorError::InvalidRequest(format!(
                "price and size must be positive (got {} @ {})",
                size, price
            )));
        }
        let symbol = self.symbol(pair);
        let call = Call::Order {
            pair: &symbol,
            side,
            price,
            size,
        };
        self.dispatch(call, options.params()).await
    }

    pub async fn order_status(&self, order_id: &str) -> Result<Response, ConnectorError> {
        self.order_status_with(order_id, &OrderOptions::new()).await
    }

    #[instrument(skip(self))]
    pub async fn order_status_with(
        &self,
        order_id: &str,
        options: &OrderOptions,
    ) -> Result<Response, ConnectorError> {
        self.dispatch(Call::OrderStatus { order_id }, options.params())
            .await
    }

    /// All open orders, as [`Response::Orders`] when normalized.
    #[instrument(skip(self))]
    pub async fn open_orders(&self) -> Result<Response, ConnectorError> {
        self.dispatch(Call::OpenOrders, &[]).await
    }

    pub async fn cancel_order(&self, order_ids: &[&str]) -> Result<CancelResult, ConnectorError> {
        self.cancel_order_with(order_ids, &OrderOptions::new()).await
    }

    /// Cancel each id with its own request, in the given order. Stops at the
    /// first failure and returns only that error; ids cancelled before it
    /// stay cancelled on the backend but their results are not returned.
    #[instrument(skip(self))]
    pub async fn cancel_order_with(
        &self,
        order_ids: &[&str],
        options: &OrderOptions,
    ) -> Result<CancelResult, ConnectorError> {
        let mut results = Vec::with_capacity(order_ids.len());
        for &order_id in order_ids {
            results.push(
                self.dispatch(Call::CancelOrder { order_id }, options.params())
                    .await?,
            );
        }
        match results.len() {
            0 => Err(ConnectorError::InvalidRequest(
                "cancel_order needs at least one order id".to_string(),
            )),
            1 => Ok(CancelResult::One(results.remove(0))),
            _ => Ok(CancelResult::Many(results)),
        }
    }

    // =========================================================================
    // Account (private)
    // =========================================================================

    /// Available balances, only strictly positive ones.
    #[instrument(skip(self))]
    pub async fn wallet(&self) -> Result<Response, ConnectorError> {
        match self.dispatch(Call::Wallet, &[]).await? {
            Response::Wallet(mut wallet) => {
                wallet.retain_positive();
                Ok(Response::Wallet(wallet))
            }
            other => Ok(other),
        }
    }

    #[instrument(skip(self, address))]
    pub async fn withdraw(
        &self,
        currency: &str,
        amount: f64,
        address: &str,
    ) -> Result<Response, ConnectorError> {
        self.dispatch(
            Call::Withdraw {
                currency,
                amount,
                address,
            },
            &[],
        )
        .await
    }
}

impl std::fmt::Debug for ExchangeInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeInterface")
            .field("client", &self.client)
            .field("pairs", &self.pairs)
            .finish()
    }
}
