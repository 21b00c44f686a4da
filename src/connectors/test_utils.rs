//! Shared test utilities for interface testing
//!
//! [`SpyTransport`] records every request it is handed and replies from a
//! queue of canned responses, so tests can assert both what was sent and
//! that nothing was sent at all.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::connectors::error::ConnectorError;
use crate::connectors::transport::{RawResponse, SignedRequest, Transport};

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Recording transport with scripted replies
#[derive(Clone, Default)]
pub struct SpyTransport {
    requests: Arc<Mutex<Vec<SignedRequest>>>,
    replies: Arc<Mutex<VecDeque<RawResponse>>>,
}

impl SpyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; replies are consumed in order.
    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(RawResponse::new(status, body));
        self
    }

    /// Queue `body` with status 200.
    pub fn ok(self, body: &str) -> Self {
        self.reply(200, body)
    }

    /// Number of requests executed so far
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Drain the recorded requests.
    pub fn take(&self) -> Vec<SignedRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn execute(&self, request: SignedRequest) -> Result<RawResponse, ConnectorError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConnectorError::Network("no scripted reply left".to_string()))
    }
}
