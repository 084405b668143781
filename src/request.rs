//! Caller-facing request shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Private posting key (WIF) of an account. Handed to the gateway untouched
/// and never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(wif: impl Into<String>) -> Self {
        Self(wif.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

impl From<&str> for SigningKey {
    fn from(wif: &str) -> Self {
        Self::new(wif)
    }
}

impl From<String> for SigningKey {
    fn from(wif: String) -> Self {
        Self::new(wif)
    }
}

/// Share of a post reward requested by the caller, in whole percents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryShare {
    pub account: String,
    pub percent: u16,
}

impl BeneficiaryShare {
    pub fn new(account: impl Into<String>, percent: u16) -> Self {
        Self {
            account: account.into(),
            percent,
        }
    }
}

/// Options understood by the per-chain metadata and beneficiary hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    pub app: Option<String>,
    pub format: Option<String>,
    pub images: Option<Vec<String>>,
    /// Golos: share 10% with golosio.
    pub as_golosio: bool,
    /// Golos: percent shared with vik (netfriend receives 10% on top).
    pub for_vik: Option<u16>,
    /// Vox: share 1% with denis-skripnik and tag the post `dpos-post`.
    pub for_ds: bool,
    /// Viz: publish as a liveblogs post.
    pub as_liveblogs: bool,
}

/// Options of a broadcast-comment request. Whether it describes a new post
/// or a reply is decided by `parent_author`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastOptions {
    pub title: Option<String>,
    pub permlink: Option<String>,
    pub tags: Option<Vec<String>>,
    pub parent_author: Option<String>,
    pub parent_permlink: Option<String>,
    pub beneficiaries: Option<Vec<BeneficiaryShare>>,
    #[serde(flatten)]
    pub publish: PublishOptions,
}

impl BroadcastOptions {
    pub fn post(title: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: Some(title.into()),
            tags: Some(tags),
            ..Default::default()
        }
    }

    pub fn reply(parent_author: impl Into<String>, parent_permlink: impl Into<String>) -> Self {
        Self {
            parent_author: Some(parent_author.into()),
            parent_permlink: Some(parent_permlink.into()),
            ..Default::default()
        }
    }

    pub fn with_permlink(mut self, permlink: impl Into<String>) -> Self {
        self.permlink = Some(permlink.into());
        self
    }

    pub fn with_beneficiaries(mut self, beneficiaries: Vec<BeneficiaryShare>) -> Self {
        self.beneficiaries = Some(beneficiaries);
        self
    }

    /// True when the options describe a reply rather than a new post.
    pub fn is_reply(&self) -> bool {
        self.parent_author
            .as_deref()
            .is_some_and(|author| !author.is_empty())
    }
}

/// Request to create a post or a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastCommentRequest {
    pub author: String,
    #[serde(rename = "wif")]
    pub signing_key: SigningKey,
    pub body: String,
    #[serde(default)]
    pub options: BroadcastOptions,
}

impl BroadcastCommentRequest {
    pub fn new(
        author: impl Into<String>,
        signing_key: impl Into<SigningKey>,
        body: impl Into<String>,
        options: BroadcastOptions,
    ) -> Self {
        Self {
            author: author.into(),
            signing_key: signing_key.into(),
            body: body.into(),
            options,
        }
    }
}

/// Voting accounts with their keys, in the order they were chosen.
#[derive(Debug, Clone, Default)]
pub struct VoterCredentials(Vec<(String, SigningKey)>);

impl VoterCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a voter; a repeated account replaces the earlier key.
    pub fn insert(&mut self, account: impl Into<String>, key: impl Into<SigningKey>) {
        let account = account.into();
        let key = key.into();
        match self.0.iter_mut().find(|(name, _)| *name == account) {
            Some(entry) => entry.1 = key,
            None => self.0.push((account, key)),
        }
    }

    pub fn contains(&self, account: &str) -> bool {
        self.0.iter().any(|(name, _)| name == account)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|(name, _)| keep(name));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &SigningKey> {
        self.0.iter().map(|(_, key)| key)
    }
}

impl<A: Into<String>, K: Into<SigningKey>> FromIterator<(A, K)> for VoterCredentials {
    fn from_iter<T: IntoIterator<Item = (A, K)>>(iter: T) -> Self {
        let mut credentials = Self::new();
        for (account, key) in iter {
            credentials.insert(account, key);
        }
        credentials
    }
}
