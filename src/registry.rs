use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::adapter::ChainAdapter;
use crate::blockchain::ChainGateway;
use crate::config::AdapterConfig;
use crate::coordinator::BroadcastCoordinator;
use crate::error::AdapterResult;
use crate::profile::{ChainName, ChainProfile};

/// Opens the gateway a newly created adapter talks through.
pub trait GatewayFactory: Send + Sync {
    fn connect(&self, profile: &ChainProfile) -> AdapterResult<Arc<dyn ChainGateway>>;
}

impl<F> GatewayFactory for F
where
    F: Fn(&ChainProfile) -> AdapterResult<Arc<dyn ChainGateway>> + Send + Sync,
{
    fn connect(&self, profile: &ChainProfile) -> AdapterResult<Arc<dyn ChainGateway>> {
        self(profile)
    }
}

#[derive(Default)]
struct RegistryState {
    adapters: HashMap<ChainName, Arc<ChainAdapter>>,
    /// Outlives the adapters, so a fresh adapter waits on work its
    /// predecessor still has in flight.
    busy_flags: HashMap<ChainName, Arc<AtomicBool>>,
}

/// Lazily created adapters, one per chain.
pub struct AdapterRegistry {
    factory: Arc<dyn GatewayFactory>,
    config: AdapterConfig,
    state: Mutex<RegistryState>,
}

impl AdapterRegistry {
    pub fn new(factory: Arc<dyn GatewayFactory>, config: AdapterConfig) -> Self {
        Self {
            factory,
            config,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Returns the adapter of `chain_name`, creating it on first use.
    ///
    /// With `fresh` set any cached adapter is dropped first, so a new
    /// connection is opened. The new adapter shares the busy flag of the
    /// old one and skips its initial reconnect while that flag is set.
    pub fn resolve(&self, chain_name: &str, fresh: bool) -> AdapterResult<Arc<ChainAdapter>> {
        let chain: ChainName = chain_name.parse()?;
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if fresh && state.adapters.remove(&chain).is_some() {
            info!("{}: dropping cached adapter", chain);
        }

        if let Some(adapter) = state.adapters.get(&chain) {
            return Ok(Arc::clone(adapter));
        }

        let mut profile = ChainProfile::for_chain(chain);
        if let Some(url) = self.config.endpoint(chain) {
            profile = profile.with_endpoint(url);
        }
        let gateway = self.factory.connect(&profile)?;
        let busy = Arc::clone(state.busy_flags.entry(chain).or_default());
        let adapter = Arc::new(ChainAdapter::with_busy_flag(
            profile,
            gateway,
            BroadcastCoordinator::new(self.config.busy_backoff),
            busy,
        ));
        state.adapters.insert(chain, Arc::clone(&adapter));

        Ok(adapter)
    }

    /// Chains with a live adapter.
    pub fn cached(&self) -> Vec<ChainName> {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.adapters.keys().copied().collect()
    }
}
