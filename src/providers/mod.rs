pub mod memory;
pub mod rpc;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::blockchain::ChainGateway;
use crate::error::AdapterResult;
use crate::profile::{ChainName, ChainProfile};
use crate::registry::GatewayFactory;

pub use memory::MemoryGateway;
pub use rpc::{JsonRpcGateway, TransactionSigner, UnsignedTransaction};

/// Opens one [`JsonRpcGateway`] per chain, all sharing `signer`.
#[derive(Default)]
pub struct JsonRpcFactory {
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl JsonRpcFactory {
    pub fn new(signer: Option<Arc<dyn TransactionSigner>>) -> Self {
        Self { signer }
    }
}

impl GatewayFactory for JsonRpcFactory {
    fn connect(&self, profile: &ChainProfile) -> AdapterResult<Arc<dyn ChainGateway>> {
        let gateway = JsonRpcGateway::new(profile.connection.clone());
        let gateway = match &self.signer {
            Some(signer) => gateway.with_signer(Arc::clone(signer)),
            None => gateway,
        };
        Ok(Arc::new(gateway))
    }
}

/// One [`MemoryGateway`] per chain, kept across fresh resolves so recorded
/// content survives them.
#[derive(Default)]
pub struct MemoryFactory {
    gateways: Mutex<HashMap<ChainName, Arc<MemoryGateway>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gateway of `chain`, created on first use.
    pub fn gateway(&self, chain: ChainName) -> Arc<MemoryGateway> {
        let mut gateways = self.gateways.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let gateway = gateways.entry(chain).or_insert_with(|| {
            let gateway = MemoryGateway::new();
            gateway.set_properties(memory::sample_properties());
            Arc::new(gateway)
        });
        Arc::clone(gateway)
    }
}

impl GatewayFactory for MemoryFactory {
    fn connect(&self, profile: &ChainProfile) -> AdapterResult<Arc<dyn ChainGateway>> {
        Ok(self.gateway(profile.name) as Arc<dyn ChainGateway>)
    }
}
