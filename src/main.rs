use std::sync::Arc;

use serde::Serialize;
use tonic::{transport::Server, Request, Response, Status};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chain_post::providers::{JsonRpcFactory, MemoryFactory};
use chain_post::request::BeneficiaryShare;
use chain_post::{
    AdapterConfig, AdapterError, AdapterRegistry, BroadcastCommentRequest, BroadcastOptions, ChainAdapter,
    GatewayFactory, PublishOptions, SigningKey, TransactionResult, VoteOutcome, VoterCredentials, FULL_VOTE_WEIGHT,
};
use proto::chain_post_server::{ChainPost, ChainPostServer};
use proto::{
    AccountResponse, AccountsInfoResponse, BroadcastCommentRequest as BroadcastCommentMessage, BroadcastVoteRequest,
    ChainSelector, ClaimRewardBalanceRequest, ClaimRewardBalanceResponse, ContentResponse, GetAccountRequest,
    GetAccountsInfoRequest, GetContentRequest, IsWifValidRequest, IsWifValidResponse, LoadPostRequest,
    LoadPostResponse, PublishRequest, TransactionResponse, VoteRequest, VoteResponse,
};

pub mod proto {
    tonic::include_proto!("chain_post");
}

pub struct ChainPostService {
    registry: Arc<AdapterRegistry>,
}

// Manual Debug implementation since the registry holds trait objects
impl std::fmt::Debug for ChainPostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainPostService")
            .field("cached", &self.registry.cached())
            .finish()
    }
}

impl ChainPostService {
    fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    fn adapter(&self, target: Option<ChainSelector>) -> Result<Arc<ChainAdapter>, Status> {
        let target = target.ok_or_else(|| Status::invalid_argument("Chain selector is missing"))?;
        self.registry
            .resolve(&target.chain, target.fresh)
            .map_err(to_status)
    }
}

fn to_status(err: AdapterError) -> Status {
    let message = err.to_string();
    match err {
        AdapterError::Validation(_) | AdapterError::InvalidUrl(_) => Status::invalid_argument(message),
        AdapterError::UnsupportedChain(_) => Status::unimplemented(message),
        AdapterError::ParentNotFound { .. }
        | AdapterError::ContentNotFound { .. }
        | AdapterError::AccountNotFound { .. } => Status::not_found(message),
        AdapterError::CredentialMismatch { .. } => Status::permission_denied(message),
        AdapterError::Broadcast { .. } | AdapterError::Gateway(_) => Status::unavailable(message),
        AdapterError::Config(_) => Status::internal(message),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, Status> {
    serde_json::to_string(value).map_err(|err| Status::internal(format!("Failed to encode response: {err}")))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn vote_weight(weight: i32) -> Result<i16, Status> {
    i16::try_from(weight).map_err(|_| Status::invalid_argument(format!("Vote weight {weight} is out of range")))
}

/// Weight of a vote request; an absent weight is a full upvote.
fn requested_vote_weight(weight: Option<i32>) -> Result<i16, Status> {
    weight.map_or(Ok(FULL_VOTE_WEIGHT), vote_weight)
}

fn publish_options(options: Option<proto::PublishOptions>) -> Result<PublishOptions, Status> {
    let Some(options) = options else {
        return Ok(PublishOptions::default());
    };
    let for_vik = options
        .for_vik
        .map(|percent| {
            u16::try_from(percent).map_err(|_| Status::invalid_argument(format!("for_vik {percent} is out of range")))
        })
        .transpose()?;

    Ok(PublishOptions {
        app: non_empty(options.app),
        format: non_empty(options.format),
        images: if options.images.is_empty() {
            None
        } else {
            Some(options.images)
        },
        as_golosio: options.as_golosio,
        for_vik,
        for_ds: options.for_ds,
        as_liveblogs: options.as_liveblogs,
    })
}

fn transaction_response(result: &TransactionResult) -> TransactionResponse {
    TransactionResponse {
        transaction_id: result.transaction_id().unwrap_or_default().to_string(),
        block_num: result.block_num().unwrap_or_default(),
        raw_json: result.raw.to_string(),
    }
}

#[tonic::async_trait]
impl ChainPost for ChainPostService {
    async fn publish(&self, request: Request<PublishRequest>) -> Result<Response<TransactionResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;
        info!("{}: publish by \"{}\"", adapter.name(), request.author);

        let options = publish_options(request.options)?;
        let result = adapter
            .publish(
                &SigningKey::new(request.wif),
                &request.author,
                &request.title,
                &request.body,
                &request.tags,
                &options,
            )
            .await
            .map_err(to_status)?;

        Ok(Response::new(transaction_response(&result)))
    }

    async fn broadcast_comment(
        &self,
        request: Request<BroadcastCommentMessage>,
    ) -> Result<Response<TransactionResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;
        info!("{}: broadcast comment by \"{}\"", adapter.name(), request.author);

        let beneficiaries = request
            .beneficiaries
            .into_iter()
            .map(|share| {
                u16::try_from(share.percent)
                    .map(|percent| BeneficiaryShare::new(share.account, percent))
                    .map_err(|_| Status::invalid_argument(format!("Beneficiary percent {} is out of range", share.percent)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = BroadcastOptions {
            title: non_empty(request.title),
            permlink: non_empty(request.permlink),
            tags: if request.tags.is_empty() {
                None
            } else {
                Some(request.tags)
            },
            parent_author: non_empty(request.parent_author),
            parent_permlink: non_empty(request.parent_permlink),
            beneficiaries: if beneficiaries.is_empty() {
                None
            } else {
                Some(beneficiaries)
            },
            publish: publish_options(request.options)?,
        };

        let result = adapter
            .broadcast_comment(BroadcastCommentRequest::new(request.author, request.wif, request.body, options))
            .await
            .map_err(to_status)?;

        Ok(Response::new(transaction_response(&result)))
    }

    async fn vote(&self, request: Request<VoteRequest>) -> Result<Response<VoteResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;
        let weight = requested_vote_weight(request.weight)?;
        let voters: VoterCredentials = request
            .voters
            .into_iter()
            .map(|voter| (voter.account, voter.wif))
            .collect();

        let response = match adapter.vote(&request.url, weight, voters).await.map_err(to_status)? {
            VoteOutcome::Voted { voters, result } => VoteResponse {
                voted: true,
                voters,
                transaction: Some(transaction_response(&result)),
                warning: String::new(),
            },
            VoteOutcome::AlreadyVoted { warning } => VoteResponse {
                voted: false,
                voters: Vec::new(),
                transaction: None,
                warning: warning.to_string(),
            },
        };

        Ok(Response::new(response))
    }

    async fn broadcast_vote(
        &self,
        request: Request<BroadcastVoteRequest>,
    ) -> Result<Response<TransactionResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;
        let weight = vote_weight(request.weight)?;

        let result = adapter
            .broadcast_vote(
                &request.voter,
                &SigningKey::new(request.wif),
                &request.author,
                &request.permlink,
                weight,
            )
            .await
            .map_err(to_status)?;

        Ok(Response::new(transaction_response(&result)))
    }

    async fn claim_reward_balance(
        &self,
        request: Request<ClaimRewardBalanceRequest>,
    ) -> Result<Response<ClaimRewardBalanceResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        let outcome = adapter
            .claim_reward_balance(&SigningKey::new(request.wif), &request.username)
            .await
            .map_err(to_status)?;

        Ok(Response::new(ClaimRewardBalanceResponse {
            account_json: to_json(&outcome.account)?,
            properties_json: to_json(&outcome.properties)?,
        }))
    }

    async fn get_account(&self, request: Request<GetAccountRequest>) -> Result<Response<AccountResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        let account = adapter
            .api_get_account(&request.username)
            .await
            .map_err(to_status)?;

        Ok(Response::new(AccountResponse {
            account_json: to_json(&account)?,
            name: account.name,
        }))
    }

    async fn get_accounts_info(
        &self,
        request: Request<GetAccountsInfoRequest>,
    ) -> Result<Response<AccountsInfoResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        let info = adapter
            .api_get_accounts_info(&request.usernames)
            .await
            .map_err(to_status)?;

        Ok(Response::new(AccountsInfoResponse {
            accounts_json: to_json(&info.accounts)?,
            properties_json: to_json(&info.properties)?,
        }))
    }

    async fn get_content(&self, request: Request<GetContentRequest>) -> Result<Response<ContentResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        let content = adapter
            .api_get_content(&request.author, &request.permlink, request.votes)
            .await
            .map_err(to_status)?;

        Ok(Response::new(ContentResponse {
            exists: content.exists(),
            content_json: to_json(&content)?,
        }))
    }

    async fn load_post(&self, request: Request<LoadPostRequest>) -> Result<Response<LoadPostResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        let post = adapter.load_post(&request.url).await.map_err(to_status)?;

        Ok(Response::new(LoadPostResponse {
            title: post.title,
            body: post.body,
            tags: post.tags,
            images: post.images,
        }))
    }

    async fn is_wif_valid(&self, request: Request<IsWifValidRequest>) -> Result<Response<IsWifValidResponse>, Status> {
        let request = request.into_inner();
        let adapter = self.adapter(request.target)?;

        adapter
            .is_wif_valid(&request.username, &SigningKey::new(request.wif))
            .await
            .map_err(to_status)?;

        Ok(Response::new(IsWifValidResponse { valid: true }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AdapterConfig::from_env()?;
    let addr = config.listen_addr;

    let factory: Arc<dyn GatewayFactory> = if config.dry_run {
        info!("Dry run: broadcasts are recorded in memory");
        Arc::new(MemoryFactory::new())
    } else {
        warn!("No transaction signer configured; broadcasts will be rejected");
        Arc::new(JsonRpcFactory::new(None))
    };

    let service = ChainPostService::new(Arc::new(AdapterRegistry::new(factory, config)));

    info!("ChainPost gRPC server listening on {}", addr);

    Server::builder()
        .add_service(ChainPostServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_weight_defaults_only_when_absent() {
        assert_eq!(requested_vote_weight(None).unwrap(), FULL_VOTE_WEIGHT);
        assert_eq!(requested_vote_weight(Some(0)).unwrap(), 0);
        assert_eq!(requested_vote_weight(Some(-10000)).unwrap(), -10000);
        assert_eq!(
            requested_vote_weight(Some(40000)).unwrap_err().code(),
            tonic::Code::InvalidArgument
        );
    }

    #[test]
    fn adapter_errors_map_to_status_codes() {
        assert_eq!(
            to_status(AdapterError::UnsupportedChain("eos".into())).code(),
            tonic::Code::Unimplemented
        );
        assert_eq!(
            to_status(AdapterError::CredentialMismatch {
                chain: "steem".into(),
                account: "alice".into(),
            })
            .code(),
            tonic::Code::PermissionDenied
        );
    }
}
