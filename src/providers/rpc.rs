//! Condenser-API JSON-RPC gateway over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::blockchain::{
    Account, ChainGateway, ConnectionParams, Content, DynamicGlobalProperties, RcAccount, RewardBalances,
    TransactionResult,
};
use crate::error::{GatewayError, GatewayResult};
use crate::operation::BroadcastBatch;
use crate::request::SigningKey;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSACTION_EXPIRATION_SECS: i64 = 60;
const CHAIN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transaction skeleton handed to a [`TransactionSigner`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsignedTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: String,
    pub operations: Value,
    pub extensions: Vec<Value>,
}

impl UnsignedTransaction {
    /// Anchors `operations` to the head block described by `properties`.
    pub fn from_properties(properties: &DynamicGlobalProperties, operations: Value) -> GatewayResult<Self> {
        let head_block_number = properties
            .get("head_block_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::other("dynamic properties lack head_block_number"))?;
        let head_block_id = properties
            .get("head_block_id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::other("dynamic properties lack head_block_id"))?;
        let time = properties
            .get("time")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::other("dynamic properties lack time"))?;

        let expiration = NaiveDateTime::parse_from_str(time, CHAIN_TIME_FORMAT)
            .map_err(|err| GatewayError::other(format!("unreadable head block time \"{time}\": {err}")))?
            + chrono::Duration::seconds(TRANSACTION_EXPIRATION_SECS);

        Ok(Self {
            ref_block_num: (head_block_number & 0xffff) as u16,
            ref_block_prefix: ref_block_prefix(head_block_id)?,
            expiration: expiration.format(CHAIN_TIME_FORMAT).to_string(),
            operations,
            extensions: Vec::new(),
        })
    }
}

/// Second 32-bit word of the block id, read little-endian.
fn ref_block_prefix(block_id: &str) -> GatewayResult<u32> {
    let word = block_id
        .get(8..16)
        .ok_or_else(|| GatewayError::other(format!("block id \"{block_id}\" is too short")))?;
    let mut bytes = [0u8; 4];
    for (index, byte) in bytes.iter_mut().enumerate() {
        let pair = &word[index * 2..index * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| GatewayError::other(format!("block id \"{block_id}\" is not hex")))?;
    }
    Ok(u32::from_le_bytes(bytes))
}

/// Signs transactions and checks keys on behalf of the gateway. Key
/// handling lives entirely behind this trait.
pub trait TransactionSigner: Send + Sync {
    /// Returns the signed transaction ready for broadcast.
    fn sign(
        &self,
        transaction: &UnsignedTransaction,
        keys: &[SigningKey],
        params: &ConnectionParams,
    ) -> Result<Value, String>;

    /// Whether `key` is the private counterpart of `public_key`.
    fn verify_key(&self, key: &SigningKey, public_key: &str, params: &ConnectionParams) -> Result<bool, String>;
}

pub struct JsonRpcGateway {
    http_client: reqwest::Client,
    params: RwLock<ConnectionParams>,
    signer: Option<Arc<dyn TransactionSigner>>,
    request_id: AtomicU64,
}

// Manual Debug implementation since the signer is a trait object
impl std::fmt::Debug for JsonRpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcGateway")
            .field("params", &self.params())
            .field("has_signer", &self.signer.is_some())
            .finish()
    }
}

impl JsonRpcGateway {
    pub fn new(params: ConnectionParams) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            params: RwLock::new(params),
            signer: None,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    fn params(&self) -> ConnectionParams {
        self.params
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn signer(&self) -> GatewayResult<&dyn TransactionSigner> {
        self.signer.as_deref().ok_or(GatewayError::SignerUnavailable)
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> GatewayResult<R> {
        let url = self.params().url;
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        debug!("{} -> {} (id {})", url, method, id);

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response: JsonRpcResponse<R> = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(GatewayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| GatewayError::MissingResult(method.to_string()))
    }

    async fn submit(&self, operations: Value, keys: &[SigningKey]) -> GatewayResult<TransactionResult> {
        let signer = self.signer()?;
        let properties = self.get_dynamic_global_properties().await?;
        let transaction = UnsignedTransaction::from_properties(&properties, operations)?;
        let signed = signer
            .sign(&transaction, keys, &self.params())
            .map_err(GatewayError::Signer)?;

        let raw: Value = self
            .call("condenser_api.broadcast_transaction_synchronous", [signed])
            .await?;
        Ok(TransactionResult::new(raw))
    }
}

#[derive(Debug, Deserialize)]
struct RcAccountsResponse {
    #[serde(default)]
    rc_accounts: Vec<RcAccount>,
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    fn reconnect(&self, params: &ConnectionParams) {
        let mut current = self
            .params
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != *params {
            *current = params.clone();
        }
    }

    async fn get_accounts(&self, names: &[String]) -> GatewayResult<Vec<Account>> {
        self.call("condenser_api.get_accounts", [names]).await
    }

    async fn get_content(&self, author: &str, permlink: &str, votes: Option<i32>) -> GatewayResult<Content> {
        let params = match votes {
            Some(votes) => json!([author, permlink, votes]),
            None => json!([author, permlink]),
        };
        self.call("condenser_api.get_content", params).await
    }

    async fn get_dynamic_global_properties(&self) -> GatewayResult<DynamicGlobalProperties> {
        self.call("condenser_api.get_dynamic_global_properties", json!([]))
            .await
    }

    async fn broadcast(&self, batch: &BroadcastBatch, credentials: &[SigningKey]) -> GatewayResult<TransactionResult> {
        let operations = serde_json::to_value(batch.operations())?;
        self.submit(operations, credentials).await
    }

    async fn claim_reward_balance(
        &self,
        key: &SigningKey,
        account: &str,
        balances: &RewardBalances,
    ) -> GatewayResult<TransactionResult> {
        let mut body = json!({
            "account": account,
            "reward_steem": balances.reward_steem,
            "reward_vests": balances.reward_vests,
        });
        if let Some(reward_sbd) = &balances.reward_sbd {
            body["reward_sbd"] = json!(reward_sbd);
        }

        self.submit(json!([["claim_reward_balance", body]]), std::slice::from_ref(key))
            .await
    }

    async fn verify_key(&self, key: &SigningKey, public_key: &str) -> GatewayResult<bool> {
        self.signer()?
            .verify_key(key, public_key, &self.params())
            .map_err(GatewayError::Signer)
    }

    async fn find_rc_accounts(&self, names: &[String]) -> GatewayResult<Vec<RcAccount>> {
        let response: RcAccountsResponse = self
            .call("rc_api.find_rc_accounts", json!({ "accounts": names }))
            .await?;
        Ok(response.rc_accounts)
    }
}
