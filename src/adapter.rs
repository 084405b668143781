use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::blockchain::{Account, ChainGateway, Content, DynamicGlobalProperties, RewardBalances, TransactionResult};
use crate::builder::{build_vote_operations, OperationBuilder, VotePlan};
use crate::connection::Connection;
use crate::coordinator::BroadcastCoordinator;
use crate::error::{AdapterError, AdapterResult};
use crate::operation::BroadcastBatch;
use crate::profile::{ChainName, ChainProfile};
use crate::request::{BroadcastCommentRequest, PublishOptions, SigningKey, VoterCredentials};
use crate::tool;
use crate::validator;

/// Weight of a full upvote.
pub const FULL_VOTE_WEIGHT: i16 = 10000;

/// Accounts together with the chain state needed to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountsInfo {
    pub accounts: Vec<Account>,
    pub properties: DynamicGlobalProperties,
}

/// Account state after a reward claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimOutcome {
    pub account: Account,
    pub properties: DynamicGlobalProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Voted {
        voters: Vec<String>,
        result: TransactionResult,
    },
    /// Nothing was broadcast; every chosen account had voted already.
    AlreadyVoted { warning: &'static str },
}

/// Title, body and metadata of an existing post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub images: Vec<String>,
}

/// Uniform entry point to one chain.
#[derive(Debug)]
pub struct ChainAdapter {
    profile: ChainProfile,
    connection: Connection,
    coordinator: BroadcastCoordinator,
}

impl ChainAdapter {
    pub fn new(profile: ChainProfile, gateway: Arc<dyn ChainGateway>, coordinator: BroadcastCoordinator) -> Self {
        Self::with_busy_flag(profile, gateway, coordinator, Arc::new(AtomicBool::new(false)))
    }

    /// Builds an adapter whose connection uses `busy` as its gate.
    pub fn with_busy_flag(
        profile: ChainProfile,
        gateway: Arc<dyn ChainGateway>,
        coordinator: BroadcastCoordinator,
        busy: Arc<AtomicBool>,
    ) -> Self {
        let connection = Connection::new(profile.name, gateway, profile.connection.clone(), busy);
        // A connection in the middle of a request keeps its settings.
        if !connection.is_busy() {
            connection.reconnect();
        }

        Self {
            profile,
            connection,
            coordinator,
        }
    }

    pub fn name(&self) -> ChainName {
        self.profile.name
    }

    pub fn currency(&self) -> &'static str {
        self.profile.currency
    }

    pub fn profile(&self) -> &ChainProfile {
        &self.profile
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn builder(&self) -> OperationBuilder<'_> {
        OperationBuilder::new(&self.profile, &self.connection)
    }

    /// Submits a prepared batch through the busy gate.
    pub async fn dispatch(&self, batch: &mut BroadcastBatch, credentials: &[SigningKey]) -> AdapterResult<TransactionResult> {
        self.coordinator
            .dispatch(&self.profile, &self.connection, batch, credentials)
            .await
    }

    /// Creates a post or a comment.
    pub async fn broadcast_comment(&self, request: BroadcastCommentRequest) -> AdapterResult<TransactionResult> {
        let mut batch = self.builder().build_post_or_comment_operations(&request).await?;
        self.dispatch(&mut batch, std::slice::from_ref(&request.signing_key)).await
    }

    /// Publishes a post with the chain's own beneficiaries and metadata.
    pub async fn publish(
        &self,
        signing_key: &SigningKey,
        author: &str,
        title: &str,
        body: &str,
        tags: &[String],
        options: &PublishOptions,
    ) -> AdapterResult<TransactionResult> {
        let errors = validator::validate_publish(author, signing_key, title, body, tags);
        if !errors.is_empty() {
            return Err(AdapterError::Validation(errors));
        }

        let mut batch = self.builder().build_publish_operations(author, title, body, tags, options);
        self.dispatch(&mut batch, std::slice::from_ref(signing_key)).await
    }

    /// Votes with every account in `voters` that has not voted on the post
    /// at `url` yet.
    pub async fn vote(&self, url: &str, weight: i16, voters: VoterCredentials) -> AdapterResult<VoteOutcome> {
        match self.builder().build_vote_batch(url, weight, voters).await? {
            VotePlan::Empty { warning } => Ok(VoteOutcome::AlreadyVoted { warning }),
            VotePlan::Batch {
                mut batch,
                voters,
                credentials,
            } => {
                let result = self.dispatch(&mut batch, &credentials).await?;
                info!("{}: voted by {:?}", self.profile.name, voters);
                Ok(VoteOutcome::Voted { voters, result })
            }
        }
    }

    /// Broadcasts a single vote without checking earlier votes.
    pub async fn broadcast_vote(
        &self,
        voter: &str,
        signing_key: &SigningKey,
        author: &str,
        permlink: &str,
        weight: i16,
    ) -> AdapterResult<TransactionResult> {
        let mut batch = BroadcastBatch::new(build_vote_operations(author, permlink, weight, [voter]));
        self.dispatch(&mut batch, std::slice::from_ref(signing_key)).await
    }

    pub async fn api_get_account(&self, username: &str) -> AdapterResult<Account> {
        self.connection.reconnect();
        let accounts = self
            .connection
            .gateway()
            .get_accounts(&[username.to_string()])
            .await?;

        accounts
            .into_iter()
            .next()
            .ok_or_else(|| self.account_not_found(username))
    }

    /// `votes` is passed to the chain as the lookup's third argument.
    pub async fn api_get_content(&self, author: &str, permlink: &str, votes: Option<i32>) -> AdapterResult<Content> {
        self.connection.reconnect();
        let content = self.connection.gateway().get_content(author, permlink, votes).await?;
        Ok(content)
    }

    /// Loads accounts and the dynamic global properties. Resource-credit
    /// data is merged in on chains that have it; failing to load it is not
    /// an error.
    pub async fn api_get_accounts_info(&self, names: &[String]) -> AdapterResult<AccountsInfo> {
        let gateway = self.connection.gateway();

        self.connection.reconnect();
        let properties = gateway.get_dynamic_global_properties().await.inspect_err(|err| {
            error!("{}: failed to load dynamic global properties: {}", self.profile.name, err);
        })?;

        self.connection.reconnect();
        let mut accounts = gateway.get_accounts(names).await.inspect_err(|err| {
            error!("{}: failed to load accounts {:?}: {}", self.profile.name, names, err);
        })?;

        if self.profile.loads_rc {
            match gateway.find_rc_accounts(names).await {
                Ok(rc_accounts) => {
                    for rc in rc_accounts {
                        if let Some(account) = accounts.iter_mut().find(|account| account.name == rc.account) {
                            account.extra.insert("max_rc".into(), rc.max_rc);
                            account
                                .extra
                                .insert("max_rc_creation_adjustment".into(), rc.max_rc_creation_adjustment);
                            account.extra.insert("rc_manabar".into(), rc.rc_manabar);
                        }
                    }
                }
                Err(err) => warn!("{}: failed to load RC data: {}", self.profile.name, err),
            }
        }

        Ok(AccountsInfo { accounts, properties })
    }

    /// Claims the pending rewards of `username` and returns the refreshed
    /// account.
    pub async fn claim_reward_balance(&self, signing_key: &SigningKey, username: &str) -> AdapterResult<ClaimOutcome> {
        let AccountsInfo {
            mut accounts,
            properties,
        } = self.api_get_accounts_info(&[username.to_string()]).await?;
        if accounts.len() != 1 {
            return Err(self.account_not_found(username));
        }
        let account = accounts.remove(0);

        let balances = RewardBalances {
            reward_steem: account.reward_steem_balance.clone().unwrap_or_default(),
            reward_sbd: if self.profile.claims_sbd {
                Some(account.reward_sbd_balance.clone().unwrap_or_default())
            } else {
                None
            },
            reward_vests: account.reward_vesting_balance.clone().unwrap_or_default(),
        };

        let _busy = self
            .connection
            .acquire("claim_reward_balance", self.coordinator.backoff())
            .await;
        let gateway = self.connection.gateway();

        gateway
            .claim_reward_balance(signing_key, &account.name, &balances)
            .await
            .map_err(|source| {
                error!("{}: failed to claim rewards of \"{}\": {}", self.profile.name, account.name, source);
                AdapterError::Broadcast {
                    chain: self.profile.name.to_string(),
                    source,
                }
            })?;

        let refreshed = gateway
            .get_accounts(std::slice::from_ref(&account.name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.account_not_found(&account.name))?;

        Ok(ClaimOutcome {
            account: refreshed,
            properties,
        })
    }

    /// Checks that `signing_key` belongs to `username`'s posting authority.
    pub async fn is_wif_valid(&self, username: &str, signing_key: &SigningKey) -> AdapterResult<()> {
        let _busy = self
            .connection
            .acquire("is_wif_valid", self.coordinator.backoff())
            .await;
        let gateway = self.connection.gateway();

        let account = gateway
            .get_accounts(&[username.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.account_not_found(username))?;

        let valid = match account.posting_key() {
            Some(public_key) => gateway.verify_key(signing_key, public_key).await.unwrap_or_else(|err| {
                error!("{}: failed to verify key of \"{}\": {}", self.profile.name, username, err);
                false
            }),
            None => false,
        };

        if valid {
            Ok(())
        } else {
            Err(AdapterError::CredentialMismatch {
                chain: self.profile.name.to_string(),
                account: username.to_string(),
            })
        }
    }

    /// Reads title, body, tags and images of the post at `url`.
    pub async fn load_post(&self, url: &str) -> AdapterResult<PostSummary> {
        let locator = tool::parse_post_url(url).ok_or_else(|| AdapterError::InvalidUrl(url.to_string()))?;
        let content = self
            .api_get_content(
                &locator.author,
                &locator.permlink,
                self.profile.return_votes_parameter().argument(),
            )
            .await?;
        if !content.exists() {
            return Err(AdapterError::ContentNotFound {
                chain: self.profile.name.to_string(),
                author: locator.author,
                permlink: locator.permlink,
            });
        }

        let metadata: Value = serde_json::from_str(&content.json_metadata).unwrap_or(Value::Null);
        let strings = |key: &str| -> Vec<String> {
            metadata
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()
        };

        Ok(PostSummary {
            tags: strings("tags"),
            images: strings("image"),
            title: content.title,
            body: content.body,
        })
    }

    fn account_not_found(&self, account: &str) -> AdapterError {
        AdapterError::AccountNotFound {
            chain: self.profile.name.to_string(),
            account: account.to_string(),
        }
    }
}
