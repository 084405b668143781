use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::coordinator::DEFAULT_BUSY_BACKOFF;
use crate::error::{AdapterError, AdapterResult};
use crate::profile::ChainName;

pub const ENV_BUSY_BACKOFF_MS: &str = "CHAIN_POST_BUSY_BACKOFF_MS";
pub const ENV_LISTEN_ADDR: &str = "CHAIN_POST_LISTEN_ADDR";
pub const ENV_DRY_RUN: &str = "CHAIN_POST_DRY_RUN";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:50051";

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Pause between two polls of a busy connection.
    pub busy_backoff: Duration,
    /// Endpoint overrides keyed by chain.
    pub endpoints: HashMap<ChainName, String>,
    pub listen_addr: SocketAddr,
    /// Record batches in memory instead of broadcasting them.
    pub dry_run: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            busy_backoff: DEFAULT_BUSY_BACKOFF,
            endpoints: HashMap::new(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            dry_run: false,
        }
    }
}

impl AdapterConfig {
    /// Reads the configuration from the process environment, loading a
    /// `.env` file first when one exists.
    pub fn from_env() -> AdapterResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AdapterResult<Self> {
        let busy_backoff = match lookup(ENV_BUSY_BACKOFF_MS) {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .map_err(|_| AdapterError::Config(format!("{ENV_BUSY_BACKOFF_MS} must be milliseconds, got \"{raw}\"")))?,
            ),
            None => DEFAULT_BUSY_BACKOFF,
        };

        let listen_addr = lookup(ENV_LISTEN_ADDR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|err| AdapterError::Config(format!("{ENV_LISTEN_ADDR} is not a socket address: {err}")))?;

        let dry_run = match lookup(ENV_DRY_RUN).as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(AdapterError::Config(format!("{ENV_DRY_RUN} must be a boolean, got \"{other}\"")));
            }
        };

        let endpoints = ChainName::ALL
            .into_iter()
            .filter_map(|chain| {
                lookup(&endpoint_variable(chain))
                    .filter(|url| !url.trim().is_empty())
                    .map(|url| (chain, url.trim().to_string()))
            })
            .collect();

        Ok(Self {
            busy_backoff,
            endpoints,
            listen_addr,
            dry_run,
        })
    }

    pub fn endpoint(&self, chain: ChainName) -> Option<&str> {
        self.endpoints.get(&chain).map(String::as_str)
    }
}

/// Name of the variable overriding `chain`'s endpoint, e.g. `CHAIN_POST_GOLOS_URL`.
pub fn endpoint_variable(chain: ChainName) -> String {
    format!("CHAIN_POST_{}_URL", chain.as_str().to_uppercase())
}
