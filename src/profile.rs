//! The closed set of supported chains and what differs between them.
//!
//! Every chain shares one default implementation of the builder hooks; a
//! profile replaces only the hooks its network needs.

use std::fmt;
use std::str::FromStr;

use crate::blockchain::ConnectionParams;
use crate::error::AdapterError;
use crate::operation::{Beneficiary, JsonMetadata};
use crate::request::PublishOptions;
use crate::tool;

/// `app` written into post metadata when the caller does not name one.
pub const DEFAULT_APP_NAME: &str = "@chain-post";
/// `app` of posts and comments created through `broadcast_comment`.
pub const COMMENT_APP_NAME: &str = "chain-tools-js";
pub const COMMENT_FORMAT: &str = "markdown";
/// Platform account receiving the default beneficiary share.
pub const PLATFORM_BENEFICIARY: &str = "chain-post";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainName {
    Steem,
    Golos,
    Vox,
    Wls,
    Weku,
    Serey,
    Smoke,
    Viz,
}

impl ChainName {
    pub const ALL: [ChainName; 8] = [
        ChainName::Steem,
        ChainName::Golos,
        ChainName::Vox,
        ChainName::Wls,
        ChainName::Weku,
        ChainName::Serey,
        ChainName::Smoke,
        ChainName::Viz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainName::Steem => "steem",
            ChainName::Golos => "golos",
            ChainName::Vox => "vox",
            ChainName::Wls => "wls",
            ChainName::Weku => "weku",
            ChainName::Serey => "serey",
            ChainName::Smoke => "smoke",
            ChainName::Viz => "viz",
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = AdapterError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ChainName::ALL
            .into_iter()
            .find(|chain| chain.as_str() == name)
            .ok_or_else(|| AdapterError::UnsupportedChain(name.to_string()))
    }
}

/// How content lookups ask a chain for active votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnVotesParameter {
    /// The chain's lookup takes no votes argument at all.
    Unsupported,
    /// The argument is left out and the node default applies.
    Omit,
    /// The argument is sent with this sentinel value.
    IncludeViaSentinel(i32),
}

impl ReturnVotesParameter {
    /// Third argument of the content lookup, if one is sent.
    pub fn argument(self) -> Option<i32> {
        match self {
            Self::Unsupported | Self::Omit => None,
            Self::IncludeViaSentinel(sentinel) => Some(sentinel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultCommentOptions {
    pub max_accepted_payout: String,
    /// `None` on chains whose `comment_options` has no such field.
    pub percent_steem_dollars: Option<u16>,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
}

impl DefaultCommentOptions {
    fn for_currency(currency: &str) -> Self {
        Self {
            max_accepted_payout: format!("1000000.000 {currency}"),
            percent_steem_dollars: Some(10000),
            allow_votes: true,
            allow_curation_rewards: true,
        }
    }
}

pub type JsonMetadataHook = fn(&[String], &PublishOptions) -> JsonMetadata;
pub type BeneficiariesHook = fn(&PublishOptions, &str) -> Vec<Beneficiary>;
pub type PermlinkHook = fn(&str) -> String;

/// Builder extension points of a chain.
#[derive(Clone, Copy)]
pub struct ProfileHooks {
    pub build_json_metadata: JsonMetadataHook,
    pub build_beneficiaries: BeneficiariesHook,
    pub build_permlink: PermlinkHook,
}

impl ProfileHooks {
    pub const DEFAULT: ProfileHooks = ProfileHooks {
        build_json_metadata: default_json_metadata,
        build_beneficiaries: default_beneficiaries,
        build_permlink: default_permlink,
    };
}

impl fmt::Debug for ProfileHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileHooks").finish_non_exhaustive()
    }
}

pub fn default_json_metadata(tags: &[String], options: &PublishOptions) -> JsonMetadata {
    JsonMetadata {
        app: options.app.clone().unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        format: options.format.clone().unwrap_or_else(|| COMMENT_FORMAT.to_string()),
        tags: tags.to_vec(),
        image: options.images.clone().unwrap_or_default(),
    }
}

pub fn default_beneficiaries(_options: &PublishOptions, _author: &str) -> Vec<Beneficiary> {
    vec![Beneficiary::new(PLATFORM_BENEFICIARY, 500)]
}

pub fn default_permlink(title: &str) -> String {
    tool::strip_and_transliterate(title, tool::DEFAULT_SPACE_REPLACEMENT, "")
}

fn golos_beneficiaries(options: &PublishOptions, author: &str) -> Vec<Beneficiary> {
    let mut beneficiaries = default_beneficiaries(options, author);
    if options.as_golosio {
        beneficiaries.push(Beneficiary::new("golosio", 1000));
    }
    if let Some(percent) = options.for_vik.filter(|percent| *percent > 0) {
        beneficiaries.push(Beneficiary::new("vik", percent.saturating_mul(100)));
        beneficiaries.push(Beneficiary::new("netfriend", 1000));
    }
    beneficiaries
}

fn vox_beneficiaries(options: &PublishOptions, author: &str) -> Vec<Beneficiary> {
    let mut beneficiaries = default_beneficiaries(options, author);
    if options.for_ds {
        beneficiaries.push(Beneficiary::new("denis-skripnik", 100));
    }
    beneficiaries
}

fn vox_json_metadata(tags: &[String], options: &PublishOptions) -> JsonMetadata {
    let mut metadata = default_json_metadata(tags, options);
    if options.for_ds {
        metadata.tags.push("dpos-post".to_string());
    }
    metadata
}

fn weku_json_metadata(tags: &[String], options: &PublishOptions) -> JsonMetadata {
    let mut metadata = default_json_metadata(tags, options);
    metadata.tags.insert(0, "community-deals".to_string());
    metadata
}

fn viz_json_metadata(tags: &[String], options: &PublishOptions) -> JsonMetadata {
    let mut metadata = default_json_metadata(tags, options);
    if options.as_liveblogs {
        metadata.tags.push("liveblogs".to_string());
    }
    metadata
}

fn viz_beneficiaries(options: &PublishOptions, author: &str) -> Vec<Beneficiary> {
    let beneficiaries = default_beneficiaries(options, author);
    if !options.as_liveblogs {
        return beneficiaries;
    }

    let mut combined = vec![Beneficiary::new("denis-skripnik", 100)];
    if !beneficiaries.iter().any(|b| b.account == author) {
        combined.push(Beneficiary::new(author, 1));
    }
    combined.extend(beneficiaries);
    combined
}

/// Identity and behaviour of one supported chain.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub name: ChainName,
    pub currency: &'static str,
    pub connection: ConnectionParams,
    pub comment_options: DefaultCommentOptions,
    pub return_votes: ReturnVotesParameter,
    pub hooks: ProfileHooks,
    /// Reward claims carry the dollar-token balance.
    pub claims_sbd: bool,
    /// Account info is enriched with resource-credit data.
    pub loads_rc: bool,
}

impl ChainProfile {
    pub fn for_chain(name: ChainName) -> Self {
        let (currency, url, address_prefix, chain_id) = match name {
            ChainName::Steem => (
                "SBD",
                "https://api.steemit.com",
                Some("STM"),
                Some("0000000000000000000000000000000000000000000000000000000000000000"),
            ),
            ChainName::Golos => ("GBG", "https://api.golos.id", None, None),
            ChainName::Vox => (
                "GOLD",
                "https://vox.community/rpc",
                Some("VOX"),
                Some("88a13f63de69c3a927594e07d991691c20e4cf1f34f83ae9bd26441db42a8acd"),
            ),
            ChainName::Wls => ("WLS", "https://pubrpc.whaleshares.io", None, None),
            ChainName::Weku => (
                "WKD",
                "https://standby.weku.io:8190",
                Some("WKA"),
                Some("b24e09256ee14bab6d58bfa3a4e47b0474a73ef4d6c47eeea007848195fa085e"),
            ),
            ChainName::Serey => (
                "SRD",
                "https://serey.io/rpc",
                Some("SRY"),
                Some("3b9a062c4c1f4338f6932ec8bfc083d99369df7479467bbab1811976181b0daf"),
            ),
            ChainName::Smoke => ("SMOKE", "https://rpc.smoke.io", None, None),
            ChainName::Viz => ("VIZ", "https://node.viz.cx", None, None),
        };

        let mut profile = ChainProfile {
            name,
            currency,
            connection: ConnectionParams {
                url: url.to_string(),
                address_prefix: address_prefix.map(str::to_string),
                chain_id: chain_id.map(str::to_string),
            },
            comment_options: DefaultCommentOptions::for_currency(currency),
            return_votes: ReturnVotesParameter::Omit,
            hooks: ProfileHooks::DEFAULT,
            claims_sbd: true,
            loads_rc: false,
        };

        match name {
            ChainName::Steem => profile.loads_rc = true,
            ChainName::Golos => {
                profile.hooks.build_beneficiaries = golos_beneficiaries;
                profile.return_votes = ReturnVotesParameter::IncludeViaSentinel(-1);
            }
            ChainName::Vox => {
                profile.hooks = ProfileHooks {
                    build_json_metadata: vox_json_metadata,
                    build_beneficiaries: vox_beneficiaries,
                    ..ProfileHooks::DEFAULT
                };
            }
            ChainName::Wls => profile.claims_sbd = false,
            ChainName::Weku => profile.hooks.build_json_metadata = weku_json_metadata,
            ChainName::Serey => profile.comment_options.percent_steem_dollars = Some(0),
            ChainName::Smoke => {
                profile.comment_options.percent_steem_dollars = None;
                profile.claims_sbd = false;
                profile.return_votes = ReturnVotesParameter::Unsupported;
            }
            ChainName::Viz => {
                profile.hooks = ProfileHooks {
                    build_json_metadata: viz_json_metadata,
                    build_beneficiaries: viz_beneficiaries,
                    ..ProfileHooks::DEFAULT
                };
                profile.return_votes = ReturnVotesParameter::IncludeViaSentinel(-1);
            }
        }

        profile
    }

    /// Replaces the RPC endpoint, keeping prefix and chain id.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.connection.url = url.into();
        self
    }

    pub fn build_json_metadata(&self, tags: &[String], options: &PublishOptions) -> JsonMetadata {
        (self.hooks.build_json_metadata)(tags, options)
    }

    pub fn build_beneficiaries(&self, options: &PublishOptions, author: &str) -> Vec<Beneficiary> {
        (self.hooks.build_beneficiaries)(options, author)
    }

    pub fn build_permlink(&self, title: &str) -> String {
        (self.hooks.build_permlink)(title)
    }

    pub fn return_votes_parameter(&self) -> ReturnVotesParameter {
        self.return_votes
    }
}
