use std::time::Duration;

use tracing::{error, info};

use crate::blockchain::TransactionResult;
use crate::connection::Connection;
use crate::error::{AdapterError, AdapterResult};
use crate::operation::BroadcastBatch;
use crate::profile::ChainProfile;
use crate::request::SigningKey;
use crate::tool;

/// Default pause between two polls of a busy connection.
pub const DEFAULT_BUSY_BACKOFF: Duration = Duration::from_secs(1);

/// Serializes broadcasts on a chain's connection and submits them.
#[derive(Debug, Clone)]
pub struct BroadcastCoordinator {
    backoff: Duration,
}

impl Default for BroadcastCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_BUSY_BACKOFF)
    }
}

impl BroadcastCoordinator {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Submits `batch` on `connection`.
    ///
    /// When the batch creates a comment whose permlink was taken after the
    /// batch was built, the permlink of its first two operations is patched
    /// in place before submission. Gateway failures are not retried.
    pub async fn dispatch(
        &self,
        profile: &ChainProfile,
        connection: &Connection,
        batch: &mut BroadcastBatch,
        credentials: &[SigningKey],
    ) -> AdapterResult<TransactionResult> {
        let _busy = connection.acquire("dispatch", self.backoff).await;
        let chain = profile.name;

        if let Some(comment) = batch.comment() {
            let permlink = comment.permlink.clone();
            let existing = connection
                .gateway()
                .get_content(&comment.author, &permlink, profile.return_votes_parameter().argument())
                .await
                .map_err(|source| {
                    error!("{}: failed to check permlink \"{}\": {}", chain, permlink, source);
                    AdapterError::Broadcast {
                        chain: chain.to_string(),
                        source,
                    }
                })?;

            if existing.exists() && existing.permlink == permlink {
                let unique = tool::build_unique_permlink(&permlink);
                info!("{}: permlink \"{}\" is already taken, using \"{}\"", chain, permlink, unique);
                batch.rewrite_permlink(&unique);
            }
        }

        match connection.gateway().broadcast(batch, credentials).await {
            Ok(result) => {
                info!(
                    "{}: broadcast of {} operation(s) succeeded: {:?}",
                    chain,
                    batch.len(),
                    result.transaction_id()
                );
                Ok(result)
            }
            Err(source) => {
                error!("{}: broadcast failed: {}", chain, source);
                Err(AdapterError::Broadcast {
                    chain: chain.to_string(),
                    source,
                })
            }
        }
    }
}
