#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chain_post::blockchain::{Account, Authority, Content};
use chain_post::providers::MemoryGateway;
use chain_post::{BroadcastCoordinator, ChainGateway, ChainAdapter, ChainName, ChainProfile};

pub const TEST_BACKOFF: Duration = Duration::from_millis(5);

pub fn adapter(chain: ChainName) -> (Arc<ChainAdapter>, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::new());
    let shared: Arc<dyn ChainGateway> = gateway.clone();
    let adapter = ChainAdapter::new(
        ChainProfile::for_chain(chain),
        shared,
        BroadcastCoordinator::new(TEST_BACKOFF),
    );
    (Arc::new(adapter), gateway)
}

pub fn post(author: &str, permlink: &str, json_metadata: &str) -> Content {
    Content {
        author: author.into(),
        permlink: permlink.into(),
        title: "Existing".into(),
        body: "existing body".into(),
        json_metadata: json_metadata.into(),
        ..Default::default()
    }
}

pub fn account(name: &str, posting_key: &str) -> Account {
    Account {
        name: name.into(),
        posting: Authority {
            weight_threshold: 1,
            key_auths: vec![(posting_key.into(), 1)],
        },
        reward_steem_balance: Some("1.000 STEEM".into()),
        reward_sbd_balance: Some("0.500 SBD".into()),
        reward_vesting_balance: Some("10.000000 VESTS".into()),
        ..Default::default()
    }
}

/// Whether `permlink` is `base` followed by a dash and a 10-digit timestamp.
pub fn is_timestamped(permlink: &str, base: &str) -> bool {
    permlink
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|suffix| suffix.len() == 10 && suffix.bytes().all(|b| b.is_ascii_digit()))
}
