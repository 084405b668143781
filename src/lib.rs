//! Publishing adapter for Steem-family social blockchains.
//!
//! One [`ChainAdapter`] per chain turns publish, comment, vote and claim
//! requests into operation batches and serializes their broadcast on the
//! chain's connection. [`AdapterRegistry`] hands adapters out by name.

pub mod adapter;
pub mod blockchain;
pub mod builder;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod operation;
pub mod profile;
pub mod providers;
pub mod registry;
pub mod request;
pub mod tool;
pub mod validator;

pub use adapter::{AccountsInfo, ChainAdapter, ClaimOutcome, PostSummary, VoteOutcome, FULL_VOTE_WEIGHT};
pub use blockchain::{ChainGateway, ConnectionParams, TransactionResult};
pub use config::AdapterConfig;
pub use coordinator::BroadcastCoordinator;
pub use error::{AdapterError, AdapterResult, GatewayError, GatewayResult};
pub use operation::{BroadcastBatch, Operation};
pub use profile::{ChainName, ChainProfile};
pub use registry::{AdapterRegistry, GatewayFactory};
pub use request::{BroadcastCommentRequest, BroadcastOptions, PublishOptions, SigningKey, VoterCredentials};
