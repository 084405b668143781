//! Turns requests into operation batches, applying the chain's hooks.
//!
//! Building reads the chain (permlink collision checks, parent and vote
//! lookups) but never takes the connection; only dispatch does.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::blockchain::Content;
use crate::connection::Connection;
use crate::error::{AdapterError, AdapterResult};
use crate::operation::{
    Beneficiary, BroadcastBatch, CommentOperation, CommentOptionsExtension, CommentOptionsOperation, Operation,
    VoteOperation,
};
use crate::profile::{ChainProfile, COMMENT_APP_NAME, COMMENT_FORMAT};
use crate::request::{BeneficiaryShare, BroadcastCommentRequest, PublishOptions, SigningKey, VoterCredentials};
use crate::tool;
use crate::validator::{self, ValidatedRequest};

/// Warning attached to a vote request that has nothing left to do.
pub const ALREADY_VOTED_WARNING: &str = "This post was upvoted by all chosen accounts earlier.";

/// Result of preparing a vote.
#[derive(Debug, Clone)]
pub enum VotePlan {
    /// Votes to broadcast, with one key per voter in operation order.
    Batch {
        batch: BroadcastBatch,
        voters: Vec<String>,
        credentials: Vec<SigningKey>,
    },
    /// Every chosen account has voted already.
    Empty { warning: &'static str },
}

pub struct OperationBuilder<'a> {
    profile: &'a ChainProfile,
    connection: &'a Connection,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(profile: &'a ChainProfile, connection: &'a Connection) -> Self {
        Self { profile, connection }
    }

    /// Builds the batch creating the post or comment described by `request`.
    ///
    /// Malformed requests are rejected before the chain is contacted.
    pub async fn build_post_or_comment_operations(
        &self,
        request: &BroadcastCommentRequest,
    ) -> AdapterResult<BroadcastBatch> {
        let validated = validator::classify(request).map_err(AdapterError::Validation)?;

        let mut options = request.options.publish.clone();
        options.app.get_or_insert_with(|| COMMENT_APP_NAME.to_string());
        options.format.get_or_insert_with(|| COMMENT_FORMAT.to_string());

        let (comment, beneficiaries) = match validated {
            ValidatedRequest::Post {
                title,
                tags,
                permlink,
                beneficiaries,
            } => {
                let comment = self
                    .build_post_operation(&request.author, &request.body, title, tags, permlink, &options)
                    .await?;
                (comment, beneficiaries)
            }
            ValidatedRequest::Comment {
                parent_author,
                parent_permlink,
                beneficiaries,
            } => {
                let comment = self
                    .build_comment_operation(&request.author, &request.body, parent_author, parent_permlink, &options)
                    .await?;
                (comment, beneficiaries)
            }
        };

        let author = comment.author.clone();
        let permlink = comment.permlink.clone();
        let mut batch = BroadcastBatch::new(vec![Operation::Comment(comment)]);

        if let Some(shares) = beneficiaries.filter(|shares| !shares.is_empty()) {
            batch.push(Operation::CommentOptions(self.comment_options(
                author,
                permlink,
                beneficiaries_from_shares(shares),
            )));
        }

        debug!("{}: built batch {:?}", self.profile.name, batch);
        Ok(batch)
    }

    async fn build_post_operation(
        &self,
        author: &str,
        body: &str,
        title: &str,
        tags: &[String],
        permlink: Option<&str>,
        options: &PublishOptions,
    ) -> AdapterResult<CommentOperation> {
        let tags: Vec<String> = tags.iter().map(|tag| tool::slugify(tag)).collect();
        // Prefixed like the tags, unlike the publish hook.
        let mut permlink = match permlink {
            Some(permlink) => permlink.to_string(),
            None => tool::slugify(title),
        };

        let existing = self.get_content(author, &permlink).await?;
        if existing.exists() {
            let unique = tool::build_unique_permlink(&permlink);
            info!(
                "{}: post \"@{}/{}\" already exists, using \"{}\"",
                self.profile.name, author, permlink, unique
            );
            permlink = unique;
        }

        Ok(CommentOperation {
            parent_author: String::new(),
            parent_permlink: tags.first().cloned().unwrap_or_default(),
            author: author.to_string(),
            permlink,
            title: title.to_string(),
            body: body.to_string(),
            json_metadata: self.profile.build_json_metadata(&tags, options),
        })
    }

    async fn build_comment_operation(
        &self,
        author: &str,
        body: &str,
        parent_author: &str,
        parent_permlink: &str,
        options: &PublishOptions,
    ) -> AdapterResult<CommentOperation> {
        let parent = self.get_content(parent_author, parent_permlink).await?;
        if !parent.exists() {
            return Err(AdapterError::ParentNotFound {
                author: parent_author.to_string(),
                permlink: parent_permlink.to_string(),
            });
        }

        let tags = inherited_tags(&parent);
        let permlink = tool::build_comment_permlink(parent_author, parent_permlink).ok_or_else(|| {
            AdapterError::ParentNotFound {
                author: parent_author.to_string(),
                permlink: parent_permlink.to_string(),
            }
        })?;

        Ok(CommentOperation {
            parent_author: parent_author.to_string(),
            parent_permlink: parent_permlink.to_string(),
            author: author.to_string(),
            permlink,
            title: String::new(),
            body: body.to_string(),
            json_metadata: self.profile.build_json_metadata(&tags, options),
        })
    }

    /// Builds the `comment` + `comment_options` pair of a plain publish.
    ///
    /// Permlink, metadata and beneficiaries all come from the chain's hooks;
    /// no collision check happens here, dispatch takes care of it.
    pub fn build_publish_operations(
        &self,
        author: &str,
        title: &str,
        body: &str,
        tags: &[String],
        options: &PublishOptions,
    ) -> BroadcastBatch {
        let permlink = self.profile.build_permlink(title);
        let beneficiaries = self.profile.build_beneficiaries(options, author);

        let comment = CommentOperation {
            parent_author: String::new(),
            parent_permlink: tags.first().cloned().unwrap_or_default(),
            author: author.to_string(),
            permlink: permlink.clone(),
            title: title.to_string(),
            body: body.to_string(),
            json_metadata: self.profile.build_json_metadata(tags, options),
        };

        BroadcastBatch::new(vec![
            Operation::Comment(comment),
            Operation::CommentOptions(self.comment_options(author.to_string(), permlink, beneficiaries)),
        ])
    }

    /// Prepares votes of `voters` on the post at `url`, skipping accounts
    /// that have voted on it already.
    pub async fn build_vote_batch(&self, url: &str, weight: i16, mut voters: VoterCredentials) -> AdapterResult<VotePlan> {
        let locator = tool::parse_post_url(url).ok_or_else(|| AdapterError::InvalidUrl(url.to_string()))?;

        let content = self.get_content(&locator.author, &locator.permlink).await?;
        if !content.exists() {
            return Err(AdapterError::ContentNotFound {
                chain: self.profile.name.to_string(),
                author: locator.author,
                permlink: locator.permlink,
            });
        }

        voters.retain(|account| !content.active_votes.iter().any(|vote| vote.voter == account));
        if voters.is_empty() {
            warn!("{}: {}", self.profile.name, ALREADY_VOTED_WARNING);
            return Ok(VotePlan::Empty {
                warning: ALREADY_VOTED_WARNING,
            });
        }

        let voter_names: Vec<String> = voters.accounts().map(str::to_string).collect();
        let batch = BroadcastBatch::new(build_vote_operations(
            &locator.author,
            &locator.permlink,
            weight,
            voter_names.iter().map(String::as_str),
        ));

        Ok(VotePlan::Batch {
            batch,
            voters: voter_names,
            credentials: voters.keys().cloned().collect(),
        })
    }

    fn comment_options(
        &self,
        author: String,
        permlink: String,
        beneficiaries: Vec<Beneficiary>,
    ) -> CommentOptionsOperation {
        let defaults = &self.profile.comment_options;
        let extensions = if beneficiaries.is_empty() {
            Vec::new()
        } else {
            vec![CommentOptionsExtension::Beneficiaries(beneficiaries)]
        };

        CommentOptionsOperation {
            author,
            permlink,
            max_accepted_payout: defaults.max_accepted_payout.clone(),
            percent_steem_dollars: defaults.percent_steem_dollars,
            allow_votes: defaults.allow_votes,
            allow_curation_rewards: defaults.allow_curation_rewards,
            extensions,
        }
    }

    async fn get_content(&self, author: &str, permlink: &str) -> AdapterResult<Content> {
        self.connection.reconnect();
        let content = self
            .connection
            .gateway()
            .get_content(author, permlink, self.profile.return_votes_parameter().argument())
            .await?;
        Ok(content)
    }
}

/// One vote operation per voter, all at `weight`.
pub fn build_vote_operations<'v>(
    author: &str,
    permlink: &str,
    weight: i16,
    voters: impl IntoIterator<Item = &'v str>,
) -> Vec<Operation> {
    voters
        .into_iter()
        .map(|voter| {
            Operation::Vote(VoteOperation {
                voter: voter.to_string(),
                author: author.to_string(),
                permlink: permlink.to_string(),
                weight,
            })
        })
        .collect()
}

/// Converts caller percents into chain weights, keeping their order.
pub fn beneficiaries_from_shares(shares: &[BeneficiaryShare]) -> Vec<Beneficiary> {
    shares
        .iter()
        .map(|share| Beneficiary::new(share.account.clone(), share.percent.saturating_mul(100)))
        .collect()
}

/// Tags of the parent's metadata; anything unreadable yields no tags.
pub fn inherited_tags(parent: &Content) -> Vec<String> {
    let metadata: Value = match serde_json::from_str(&parent.json_metadata) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!(
                "metadata of \"@{}/{}\" is not valid JSON ({}), comment gets no tags",
                parent.author, parent.permlink, err
            );
            return Vec::new();
        }
    };

    match metadata.get("tags") {
        Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
