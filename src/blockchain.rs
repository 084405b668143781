use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayResult;
use crate::operation::BroadcastBatch;
use crate::request::SigningKey;

/// Connection settings applied to a gateway on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub url: String,
    pub address_prefix: Option<String>,
    pub chain_id: Option<String>,
}

/// Raw broadcast acknowledgement, kept exactly as the node returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    pub raw: Value,
}

impl TransactionResult {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    pub fn block_num(&self) -> Option<u64> {
        self.raw.get("block_num").and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Authority {
    pub weight_threshold: u32,
    pub key_auths: Vec<(String, u16)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub name: String,
    pub posting: Authority,
    pub reward_steem_balance: Option<String>,
    pub reward_sbd_balance: Option<String>,
    pub reward_vesting_balance: Option<String>,
    /// Every other field the chain returned, including resource-credit data
    /// merged in after the lookup.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Account {
    /// First public posting key of the account.
    pub fn posting_key(&self) -> Option<&str> {
        self.posting.key_auths.first().map(|(key, _)| key.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveVote {
    pub voter: String,
    pub percent: i64,
}

/// A post or comment. Nodes answer lookups of missing content with a
/// zeroed record, so `id == 0` means "does not exist".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Content {
    pub id: u64,
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
    pub active_votes: Vec<ActiveVote>,
}

impl Content {
    pub fn exists(&self) -> bool {
        self.id != 0
    }
}

/// Chain-wide economic state, passed through untouched.
pub type DynamicGlobalProperties = Map<String, Value>;

/// Pending reward balances claimed in one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardBalances {
    pub reward_steem: String,
    /// Absent on chains without a dollar-pegged token.
    pub reward_sbd: Option<String>,
    pub reward_vests: String,
}

/// Resource-credit record of one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcAccount {
    pub account: String,
    pub max_rc: Value,
    pub max_rc_creation_adjustment: Value,
    pub rc_manabar: Value,
}

/// Remote RPC surface of one chain.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Re-apply connection settings. Must be idempotent.
    fn reconnect(&self, params: &ConnectionParams);

    async fn get_accounts(&self, names: &[String]) -> GatewayResult<Vec<Account>>;

    /// `votes` is forwarded as the third lookup argument when present.
    async fn get_content(&self, author: &str, permlink: &str, votes: Option<i32>) -> GatewayResult<Content>;

    async fn get_dynamic_global_properties(&self) -> GatewayResult<DynamicGlobalProperties>;

    /// Submit `batch` as one transaction signed with `credentials`.
    async fn broadcast(&self, batch: &BroadcastBatch, credentials: &[SigningKey]) -> GatewayResult<TransactionResult>;

    async fn claim_reward_balance(
        &self,
        key: &SigningKey,
        account: &str,
        balances: &RewardBalances,
    ) -> GatewayResult<TransactionResult>;

    /// Whether `key` is the private counterpart of `public_key`.
    async fn verify_key(&self, key: &SigningKey, public_key: &str) -> GatewayResult<bool>;

    /// Resource-credit data; chains without it answer with nothing.
    async fn find_rc_accounts(&self, _names: &[String]) -> GatewayResult<Vec<RcAccount>> {
        Ok(Vec::new())
    }
}
