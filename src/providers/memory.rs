//! In-process gateway that records broadcasts instead of sending them.
//!
//! Serves dry runs and tests. Broadcast comments become readable content,
//! so a second publish of the same title sees the first one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::blockchain::{
    Account, ActiveVote, ChainGateway, ConnectionParams, Content, DynamicGlobalProperties, RcAccount,
    RewardBalances, TransactionResult,
};
use crate::error::{GatewayError, GatewayResult};
use crate::operation::{BroadcastBatch, Operation};
use crate::request::SigningKey;

/// A batch as it reached the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBroadcast {
    pub batch: BroadcastBatch,
    /// Keys the batch was signed with, exposed for assertions.
    pub credentials: Vec<String>,
}

/// A reward claim as it reached the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClaim {
    pub account: String,
    pub balances: RewardBalances,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    contents: HashMap<(String, String), Content>,
    rc_accounts: HashMap<String, RcAccount>,
    properties: DynamicGlobalProperties,
    /// Public key to private key.
    key_pairs: HashMap<String, String>,
    broadcasts: Vec<RecordedBroadcast>,
    claims: Vec<RecordedClaim>,
    content_lookups: Vec<(String, String, Option<i32>)>,
    reconnects: Vec<ConnectionParams>,
    fail_broadcasts: Option<String>,
    fail_content_lookups: Option<String>,
    broadcast_delay: Option<Duration>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_account(&self, account: Account) {
        self.state().accounts.insert(account.name.clone(), account);
    }

    /// Inserts `content`, assigning an id when it has none.
    pub fn insert_content(&self, mut content: Content) {
        let mut state = self.state();
        if content.id == 0 {
            state.next_id += 1;
            content.id = state.next_id;
        }
        state
            .contents
            .insert((content.author.clone(), content.permlink.clone()), content);
    }

    pub fn insert_rc_account(&self, rc: RcAccount) {
        self.state().rc_accounts.insert(rc.account.clone(), rc);
    }

    pub fn set_properties(&self, properties: DynamicGlobalProperties) {
        self.state().properties = properties;
    }

    /// Makes `verify_key` accept `private_key` for `public_key`.
    pub fn register_key_pair(&self, public_key: impl Into<String>, private_key: impl Into<String>) {
        self.state().key_pairs.insert(public_key.into(), private_key.into());
    }

    /// Makes every later broadcast fail with `message`; `None` restores
    /// normal operation.
    pub fn fail_broadcasts(&self, message: Option<&str>) {
        self.state().fail_broadcasts = message.map(str::to_string);
    }

    /// Makes every later content lookup fail with `message`; `None`
    /// restores normal operation.
    pub fn fail_content_lookups(&self, message: Option<&str>) {
        self.state().fail_content_lookups = message.map(str::to_string);
    }

    /// Holds every broadcast for `delay` before it completes.
    pub fn set_broadcast_delay(&self, delay: Duration) {
        self.state().broadcast_delay = Some(delay);
    }

    pub fn broadcasts(&self) -> Vec<RecordedBroadcast> {
        self.state().broadcasts.clone()
    }

    pub fn claims(&self) -> Vec<RecordedClaim> {
        self.state().claims.clone()
    }

    /// Every `(author, permlink, votes)` content lookup so far.
    pub fn content_lookups(&self) -> Vec<(String, String, Option<i32>)> {
        self.state().content_lookups.clone()
    }

    pub fn reconnects(&self) -> Vec<ConnectionParams> {
        self.state().reconnects.clone()
    }

    pub fn content(&self, author: &str, permlink: &str) -> Option<Content> {
        self.state()
            .contents
            .get(&(author.to_string(), permlink.to_string()))
            .cloned()
    }

    /// Highest number of broadcasts that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlight { gateway: self }
    }

    fn acknowledge(state: &mut MemoryState) -> TransactionResult {
        state.next_id += 1;
        let id = state.next_id;
        TransactionResult::new(json!({
            "id": format!("memory-{id}"),
            "block_num": id,
            "trx_num": 0,
            "expired": false,
        }))
    }

    /// Makes the effects of `batch` visible to later lookups.
    fn apply(state: &mut MemoryState, batch: &BroadcastBatch) {
        for operation in batch.operations() {
            match operation {
                Operation::Comment(comment) => {
                    let key = (comment.author.clone(), comment.permlink.clone());
                    if state.contents.contains_key(&key) {
                        continue;
                    }
                    state.next_id += 1;
                    let content = Content {
                        id: state.next_id,
                        author: comment.author.clone(),
                        permlink: comment.permlink.clone(),
                        title: comment.title.clone(),
                        body: comment.body.clone(),
                        json_metadata: serde_json::to_string(&comment.json_metadata).unwrap_or_default(),
                        active_votes: Vec::new(),
                    };
                    state.contents.insert(key, content);
                }
                Operation::Vote(vote) => {
                    if let Some(content) = state
                        .contents
                        .get_mut(&(vote.author.clone(), vote.permlink.clone()))
                    {
                        content.active_votes.push(ActiveVote {
                            voter: vote.voter.clone(),
                            percent: i64::from(vote.weight),
                        });
                    }
                }
                Operation::CommentOptions(_) => {}
            }
        }
    }
}

struct InFlight<'a> {
    gateway: &'a MemoryGateway,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gateway.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainGateway for MemoryGateway {
    fn reconnect(&self, params: &ConnectionParams) {
        self.state().reconnects.push(params.clone());
    }

    async fn get_accounts(&self, names: &[String]) -> GatewayResult<Vec<Account>> {
        let state = self.state();
        Ok(names
            .iter()
            .filter_map(|name| state.accounts.get(name).cloned())
            .collect())
    }

    async fn get_content(&self, author: &str, permlink: &str, votes: Option<i32>) -> GatewayResult<Content> {
        let mut state = self.state();
        state
            .content_lookups
            .push((author.to_string(), permlink.to_string(), votes));
        if let Some(message) = &state.fail_content_lookups {
            return Err(GatewayError::Other(message.clone()));
        }
        Ok(state
            .contents
            .get(&(author.to_string(), permlink.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_dynamic_global_properties(&self) -> GatewayResult<DynamicGlobalProperties> {
        Ok(self.state().properties.clone())
    }

    async fn broadcast(&self, batch: &BroadcastBatch, credentials: &[SigningKey]) -> GatewayResult<TransactionResult> {
        let _in_flight = self.enter();

        let delay = self.state().broadcast_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(message) = &state.fail_broadcasts {
            return Err(GatewayError::Other(message.clone()));
        }

        state.broadcasts.push(RecordedBroadcast {
            batch: batch.clone(),
            credentials: credentials.iter().map(|key| key.expose().to_string()).collect(),
        });
        Self::apply(&mut state, batch);
        info!("memory gateway recorded {} operation(s)", batch.len());

        Ok(Self::acknowledge(&mut state))
    }

    async fn claim_reward_balance(
        &self,
        _key: &SigningKey,
        account: &str,
        balances: &RewardBalances,
    ) -> GatewayResult<TransactionResult> {
        let mut state = self.state();
        if let Some(message) = &state.fail_broadcasts {
            return Err(GatewayError::Other(message.clone()));
        }

        state.claims.push(RecordedClaim {
            account: account.to_string(),
            balances: balances.clone(),
        });
        if let Some(stored) = state.accounts.get_mut(account) {
            stored.reward_steem_balance = None;
            stored.reward_sbd_balance = None;
            stored.reward_vesting_balance = None;
        }

        Ok(Self::acknowledge(&mut state))
    }

    async fn verify_key(&self, key: &SigningKey, public_key: &str) -> GatewayResult<bool> {
        Ok(self
            .state()
            .key_pairs
            .get(public_key)
            .is_some_and(|private_key| private_key == key.expose()))
    }

    async fn find_rc_accounts(&self, names: &[String]) -> GatewayResult<Vec<RcAccount>> {
        let state = self.state();
        Ok(names
            .iter()
            .filter_map(|name| state.rc_accounts.get(name).cloned())
            .collect())
    }
}

/// Properties a memory gateway reports when nothing else was set.
pub fn sample_properties() -> DynamicGlobalProperties {
    match json!({
        "head_block_number": 1,
        "head_block_id": "0000000100000000000000000000000000000000",
        "time": "2024-01-01T00:00:00",
    }) {
        Value::Object(properties) => properties,
        _ => DynamicGlobalProperties::new(),
    }
}
