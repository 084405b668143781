//! The physical connection of one chain and its busy flag.
//!
//! Waiters poll the flag with a fixed backoff instead of queueing, so the
//! order in which they get through is unspecified and a waiter can starve
//! under contention. There is no timeout: a connection that never frees up
//! blocks every later caller on that chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::blockchain::{ChainGateway, ConnectionParams};
use crate::profile::ChainName;

pub struct Connection {
    chain: ChainName,
    gateway: Arc<dyn ChainGateway>,
    params: ConnectionParams,
    busy: Arc<AtomicBool>,
}

// Manual Debug implementation since the gateway is a trait object
impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("chain", &self.chain)
            .field("url", &self.params.url)
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl Connection {
    /// `busy` may be shared with earlier connections of the same chain, so
    /// a replacement waits for work they still have in flight.
    pub fn new(
        chain: ChainName,
        gateway: Arc<dyn ChainGateway>,
        params: ConnectionParams,
        busy: Arc<AtomicBool>,
    ) -> Self {
        Self {
            chain,
            gateway,
            params,
            busy,
        }
    }

    pub fn gateway(&self) -> &dyn ChainGateway {
        self.gateway.as_ref()
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Re-applies this chain's settings to the gateway.
    pub fn reconnect(&self) {
        debug!("{}: reconnecting to {}", self.chain, self.params.url);
        self.gateway.reconnect(&self.params);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Waits until the connection is free, then takes it. The returned
    /// guard frees the connection when dropped.
    pub async fn acquire(&self, operation: &str, backoff: Duration) -> BusyGuard<'_> {
        while self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("{}:{}: wait execution for {:?}", self.chain, operation, backoff);
            tokio::time::sleep(backoff).await;
        }

        self.reconnect();
        BusyGuard { connection: self }
    }
}

/// Exclusive use of a [`Connection`]; released on drop.
#[must_use = "the connection is released as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    connection: &'a Connection,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.connection.busy.store(false, Ordering::Release);
    }
}
