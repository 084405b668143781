//! Chain operations and the batch they are broadcast in.
//!
//! Operations serialize to the `[name, body]` pairs every fork of the
//! protocol accepts, so a batch can be handed to a gateway as-is.

use serde::ser::{SerializeStruct, SerializeTuple};
use serde::{Serialize, Serializer};

/// `json_metadata` of a post or comment. Serialized as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonMetadata {
    pub app: String,
    pub format: String,
    pub tags: Vec<String>,
    pub image: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentOperation {
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    #[serde(serialize_with = "serialize_as_json_string")]
    pub json_metadata: JsonMetadata,
}

/// Reward beneficiary; `weight` is a percentage times 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Beneficiary {
    pub account: String,
    pub weight: u16,
}

impl Beneficiary {
    pub fn new(account: impl Into<String>, weight: u16) -> Self {
        Self {
            account: account.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOptionsExtension {
    Beneficiaries(Vec<Beneficiary>),
}

impl Serialize for CommentOptionsExtension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct BeneficiariesBody<'a> {
            beneficiaries: &'a [Beneficiary],
        }

        let mut tuple = serializer.serialize_tuple(2)?;
        match self {
            Self::Beneficiaries(beneficiaries) => {
                tuple.serialize_element(&0u8)?;
                tuple.serialize_element(&BeneficiariesBody { beneficiaries })?;
            }
        }
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentOptionsOperation {
    pub author: String,
    pub permlink: String,
    pub max_accepted_payout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_steem_dollars: Option<u16>,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<CommentOptionsExtension>,
}

impl CommentOptionsOperation {
    /// Beneficiaries carried in the extensions, if any.
    pub fn beneficiaries(&self) -> Option<&[Beneficiary]> {
        self.extensions.iter().find_map(|extension| match extension {
            CommentOptionsExtension::Beneficiaries(list) => Some(list.as_slice()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOperation {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Comment(CommentOperation),
    CommentOptions(CommentOptionsOperation),
    Vote(VoteOperation),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Comment(_) => "comment",
            Self::CommentOptions(_) => "comment_options",
            Self::Vote(_) => "vote",
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Self::Comment(op) => &op.author,
            Self::CommentOptions(op) => &op.author,
            Self::Vote(op) => &op.author,
        }
    }

    pub fn permlink(&self) -> &str {
        match self {
            Self::Comment(op) => &op.permlink,
            Self::CommentOptions(op) => &op.permlink,
            Self::Vote(op) => &op.permlink,
        }
    }

    fn set_permlink(&mut self, permlink: &str) {
        let target = match self {
            Self::Comment(op) => &mut op.permlink,
            Self::CommentOptions(op) => &mut op.permlink,
            Self::Vote(op) => &mut op.permlink,
        };
        *target = permlink.to_string();
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(self.name())?;
        match self {
            Self::Comment(op) => tuple.serialize_element(op)?,
            Self::CommentOptions(op) => tuple.serialize_element(op)?,
            Self::Vote(op) => tuple.serialize_element(op)?,
        }
        tuple.end()
    }
}

/// Ordered operations submitted to a chain as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastBatch {
    operations: Vec<Operation>,
}

impl BroadcastBatch {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn primary(&self) -> Option<&Operation> {
        self.operations.first()
    }

    /// The comment this batch creates, when its primary operation is one.
    pub fn comment(&self) -> Option<&CommentOperation> {
        match self.primary() {
            Some(Operation::Comment(op)) => Some(op),
            _ => None,
        }
    }

    /// Replaces the permlink of the first operation and, when present, of
    /// the second one. Later operations are left untouched.
    pub fn rewrite_permlink(&mut self, permlink: &str) {
        for operation in self.operations.iter_mut().take(2) {
            operation.set_permlink(permlink);
        }
    }
}

impl Serialize for BroadcastBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BroadcastBatch", 2)?;
        state.serialize_field("extensions", &[] as &[()])?;
        state.serialize_field("operations", &self.operations)?;
        state.end()
    }
}

fn serialize_as_json_string<S: Serializer>(metadata: &JsonMetadata, serializer: S) -> Result<S::Ok, S::Error> {
    let encoded = serde_json::to_string(metadata).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&encoded)
}
