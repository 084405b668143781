mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use chain_post::blockchain::{ActiveVote, Content, RcAccount};
use chain_post::operation::{Beneficiary, JsonMetadata, Operation};
use chain_post::request::BeneficiaryShare;
use chain_post::{
    AdapterError, BroadcastCommentRequest, BroadcastOptions, ChainName, PublishOptions, SigningKey, VoteOutcome,
    VoterCredentials, FULL_VOTE_WEIGHT,
};

use common::{account, adapter, is_timestamped, post};

fn hello_world() -> BroadcastCommentRequest {
    BroadcastCommentRequest::new(
        "alice",
        "5Kalice",
        "hi",
        BroadcastOptions::post("Hello World", vec!["test".into()]),
    )
}

#[tokio::test]
async fn builds_hello_world_post() {
    let (adapter, _gateway) = adapter(ChainName::Steem);

    let batch = adapter
        .builder()
        .build_post_or_comment_operations(&hello_world())
        .await
        .unwrap();

    assert_eq!(batch.len(), 1);
    let comment = batch.comment().unwrap();
    assert_eq!(comment.parent_author, "");
    assert_eq!(comment.parent_permlink, "test");
    assert_eq!(comment.author, "alice");
    assert_eq!(comment.permlink, "hello-world");
    assert_eq!(comment.title, "Hello World");
    assert_eq!(comment.body, "hi");
    assert_eq!(
        comment.json_metadata,
        JsonMetadata {
            app: "chain-tools-js".into(),
            format: "markdown".into(),
            tags: vec!["test".into()],
            image: vec![],
        }
    );
}

#[tokio::test]
async fn existing_permlink_gets_timestamp_suffix() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_content(post("alice", "hello-world", "{}"));

    let batch = adapter
        .builder()
        .build_post_or_comment_operations(&hello_world())
        .await
        .unwrap();

    let permlink = &batch.comment().unwrap().permlink;
    assert!(is_timestamped(permlink, "hello-world"), "unexpected permlink {permlink}");
}

#[tokio::test]
async fn dispatch_patches_permlink_taken_after_build() {
    let (adapter, gateway) = adapter(ChainName::Golos);
    let mut batch = adapter.builder().build_publish_operations(
        "alice",
        "Hello World",
        "hi",
        &["test".to_string()],
        &PublishOptions::default(),
    );
    assert_eq!(batch.comment().unwrap().permlink, "hello-world");

    gateway.insert_content(post("alice", "hello-world", "{}"));
    adapter
        .dispatch(&mut batch, &[SigningKey::new("5Kalice")])
        .await
        .unwrap();

    let permlink = batch.operations()[0].permlink().to_string();
    assert!(is_timestamped(&permlink, "hello-world"), "unexpected permlink {permlink}");
    assert_eq!(batch.operations()[1].permlink(), permlink);
    assert_eq!(gateway.broadcasts()[0].batch, batch);
}

#[tokio::test]
async fn broadcast_comment_submits_one_transaction() {
    let (adapter, gateway) = adapter(ChainName::Steem);

    let result = adapter.broadcast_comment(hello_world()).await.unwrap();

    assert!(result.transaction_id().is_some());
    let broadcasts = gateway.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].credentials, vec!["5Kalice"]);
    assert!(gateway.content("alice", "hello-world").is_some());
    assert!(!adapter.connection().is_busy());
}

#[tokio::test]
async fn publishing_same_title_twice_uses_new_permlink() {
    let (adapter, gateway) = adapter(ChainName::Steem);

    adapter.broadcast_comment(hello_world()).await.unwrap();
    adapter.broadcast_comment(hello_world()).await.unwrap();

    let broadcasts = gateway.broadcasts();
    let first = broadcasts[0].batch.comment().unwrap().permlink.clone();
    let second = broadcasts[1].batch.comment().unwrap().permlink.clone();
    assert_eq!(first, "hello-world");
    assert_ne!(first, second);
    assert!(is_timestamped(&second, "hello-world"));
}

#[tokio::test]
async fn beneficiaries_keep_caller_order() {
    let (adapter, _gateway) = adapter(ChainName::Steem);
    let request = BroadcastCommentRequest::new(
        "alice",
        "5Kalice",
        "hi",
        BroadcastOptions::post("Shared", vec!["test".into()])
            .with_beneficiaries(vec![BeneficiaryShare::new("a", 10), BeneficiaryShare::new("b", 20)]),
    );

    let batch = adapter
        .builder()
        .build_post_or_comment_operations(&request)
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert_matches!(&batch.operations()[1], Operation::CommentOptions(options) => {
        assert_eq!(options.permlink, "shared");
        assert_eq!(
            options.beneficiaries(),
            Some(&[Beneficiary::new("a", 1000), Beneficiary::new("b", 2000)][..])
        );
    });
}

#[tokio::test]
async fn reply_inherits_parent_tags_and_ignores_title() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_content(post("bob", "trip", r#"{"tags":["travel","photo"]}"#));

    let mut options = BroadcastOptions::reply("bob", "trip").with_permlink("my-own-permlink");
    options.title = Some("Ignored".into());
    let request = BroadcastCommentRequest::new("alice", "5Kalice", "nice", options);

    let batch = adapter
        .builder()
        .build_post_or_comment_operations(&request)
        .await
        .unwrap();

    let comment = batch.comment().unwrap();
    assert_eq!(comment.title, "");
    assert_eq!(comment.parent_author, "bob");
    assert_eq!(comment.parent_permlink, "trip");
    assert_ne!(comment.permlink, "my-own-permlink");
    assert!(comment.permlink.starts_with("re-bob-trip-"));
    assert_eq!(comment.json_metadata.tags, vec!["travel", "photo"]);
}

#[tokio::test]
async fn reply_to_missing_parent_fails() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    let request = BroadcastCommentRequest::new("alice", "5Kalice", "nice", BroadcastOptions::reply("bob", "gone"));

    let result = adapter.broadcast_comment(request).await;

    assert_matches!(result, Err(AdapterError::ParentNotFound { author, permlink }) => {
        assert_eq!(author, "bob");
        assert_eq!(permlink, "gone");
    });
    assert!(gateway.broadcasts().is_empty());
}

#[tokio::test]
async fn invalid_request_never_reaches_the_chain() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    let request = BroadcastCommentRequest::new("", "", "hi", BroadcastOptions::post("", vec![]));

    let err = adapter.broadcast_comment(request).await.unwrap_err();

    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"author"));
    assert!(fields.contains(&"wif"));
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"tags"));
    assert!(gateway.content_lookups().is_empty());
    assert!(gateway.broadcasts().is_empty());
}

#[tokio::test]
async fn busy_flag_is_released_after_failed_broadcast() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.fail_broadcasts(Some("node down"));

    let result = adapter.broadcast_comment(hello_world()).await;

    assert_matches!(result, Err(AdapterError::Broadcast { chain, .. }) => assert_eq!(chain, "steem"));
    assert!(!adapter.connection().is_busy());

    gateway.fail_broadcasts(None);
    adapter.broadcast_comment(hello_world()).await.unwrap();
    assert!(!adapter.connection().is_busy());
}

#[tokio::test]
async fn concurrent_broadcasts_are_serialized() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.set_broadcast_delay(Duration::from_millis(30));

    let requests = ["One", "Two", "Three"].map(|title| {
        BroadcastCommentRequest::new("alice", "5Kalice", "hi", BroadcastOptions::post(title, vec!["test".into()]))
    });
    let [first, second, third] = requests;

    let (a, b, c) = tokio::join!(
        adapter.broadcast_comment(first),
        adapter.broadcast_comment(second),
        adapter.broadcast_comment(third),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(gateway.broadcasts().len(), 3);
    assert_eq!(gateway.max_in_flight(), 1);
    assert!(!adapter.connection().is_busy());
}

#[tokio::test]
async fn publish_uses_chain_beneficiaries() {
    let (adapter, gateway) = adapter(ChainName::Golos);
    let options = PublishOptions {
        as_golosio: true,
        for_vik: Some(5),
        ..Default::default()
    };

    adapter
        .publish(
            &SigningKey::new("5Kalice"),
            "alice",
            "Привет мир",
            "body",
            &["life".to_string()],
            &options,
        )
        .await
        .unwrap();

    let batch = gateway.broadcasts().remove(0).batch;
    assert_eq!(batch.len(), 2);
    assert_matches!(&batch.operations()[1], Operation::CommentOptions(options) => {
        assert_eq!(options.max_accepted_payout, "1000000.000 GBG");
        assert_eq!(
            options.beneficiaries(),
            Some(
                &[
                    Beneficiary::new("chain-post", 500),
                    Beneficiary::new("golosio", 1000),
                    Beneficiary::new("vik", 500),
                    Beneficiary::new("netfriend", 1000),
                ][..]
            )
        );
    });
    assert_eq!(batch.comment().unwrap().json_metadata.app, "@chain-post");
}

#[tokio::test]
async fn smoke_publish_omits_percent_steem_dollars() {
    let (adapter, gateway) = adapter(ChainName::Smoke);

    adapter
        .publish(
            &SigningKey::new("5Kalice"),
            "alice",
            "Smoke test",
            "body",
            &["smoke".to_string()],
            &PublishOptions::default(),
        )
        .await
        .unwrap();

    let batch = gateway.broadcasts().remove(0).batch;
    let value = serde_json::to_value(&batch).unwrap();
    assert!(value["operations"][1][1].get("percent_steem_dollars").is_none());
    assert_eq!(value["operations"][1][1]["max_accepted_payout"], "1000000.000 SMOKE");
    assert!(gateway
        .content_lookups()
        .iter()
        .all(|(_, _, votes)| votes.is_none()));
}

#[tokio::test]
async fn publish_rejects_missing_tags() {
    let (adapter, gateway) = adapter(ChainName::Steem);

    let result = adapter
        .publish(&SigningKey::new("5Kalice"), "alice", "Title", "body", &[], &PublishOptions::default())
        .await;

    assert_matches!(result, Err(AdapterError::Validation(errors)) => assert_eq!(errors[0].field, "tags"));
    assert!(gateway.broadcasts().is_empty());
}

#[tokio::test]
async fn vote_skips_accounts_that_voted() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_content(Content {
        active_votes: vec![ActiveVote {
            voter: "bob".into(),
            percent: 10000,
        }],
        ..post("alice", "trip", "{}")
    });
    let voters: VoterCredentials = [("bob", "5Kbob"), ("carol", "5Kcarol")].into_iter().collect();

    let outcome = adapter
        .vote("https://steemit.com/travel/@alice/trip", FULL_VOTE_WEIGHT, voters)
        .await
        .unwrap();

    assert_matches!(outcome, VoteOutcome::Voted { voters, .. } => assert_eq!(voters, vec!["carol"]));
    let recorded = gateway.broadcasts().remove(0);
    assert_eq!(recorded.batch.len(), 1);
    assert_eq!(recorded.credentials, vec!["5Kcarol"]);
}

#[tokio::test]
async fn vote_with_everyone_voted_is_a_no_op() {
    let (adapter, gateway) = adapter(ChainName::Golos);
    gateway.insert_content(Content {
        active_votes: vec![ActiveVote {
            voter: "bob".into(),
            percent: 10000,
        }],
        ..post("alice", "trip", "{}")
    });
    let voters: VoterCredentials = [("bob", "5Kbob")].into_iter().collect();

    let outcome = adapter
        .vote("https://golos.id/?author=alice&permlink=trip", FULL_VOTE_WEIGHT, voters)
        .await
        .unwrap();

    assert_matches!(outcome, VoteOutcome::AlreadyVoted { warning } => {
        assert_eq!(warning, "This post was upvoted by all chosen accounts earlier.");
    });
    assert!(gateway.broadcasts().is_empty());
    assert_eq!(gateway.content_lookups()[0].2, Some(-1));
}

#[tokio::test]
async fn vote_on_missing_post_fails() {
    let (adapter, _gateway) = adapter(ChainName::Steem);
    let voters: VoterCredentials = [("bob", "5Kbob")].into_iter().collect();

    assert_matches!(
        adapter.vote("https://steemit.com/@alice/gone", FULL_VOTE_WEIGHT, voters.clone()).await,
        Err(AdapterError::ContentNotFound { .. })
    );
    assert_matches!(
        adapter.vote("https://steemit.com/trending", FULL_VOTE_WEIGHT, voters).await,
        Err(AdapterError::InvalidUrl(_))
    );
}

#[tokio::test]
async fn broadcast_vote_sends_single_vote() {
    let (adapter, gateway) = adapter(ChainName::Steem);

    adapter
        .broadcast_vote("bob", &SigningKey::new("5Kbob"), "alice", "trip", -2500)
        .await
        .unwrap();

    let batch = gateway.broadcasts().remove(0).batch;
    let value = serde_json::to_value(&batch).unwrap();
    assert_eq!(
        value["operations"],
        json!([["vote", {"voter": "bob", "author": "alice", "permlink": "trip", "weight": -2500}]])
    );
}

#[tokio::test]
async fn wif_check_matches_posting_key() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_account(account("alice", "STMalice"));
    gateway.register_key_pair("STMalice", "5Kalice");

    adapter
        .is_wif_valid("alice", &SigningKey::new("5Kalice"))
        .await
        .unwrap();
    assert_matches!(
        adapter.is_wif_valid("alice", &SigningKey::new("5Kother")).await,
        Err(AdapterError::CredentialMismatch { account, .. }) => assert_eq!(account, "alice")
    );
    assert_matches!(
        adapter.is_wif_valid("nobody", &SigningKey::new("5Kalice")).await,
        Err(AdapterError::AccountNotFound { .. })
    );
    assert!(!adapter.connection().is_busy());
}

#[tokio::test]
async fn steem_account_info_includes_rc_data() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_account(account("alice", "STMalice"));
    gateway.insert_rc_account(RcAccount {
        account: "alice".into(),
        max_rc: json!("1000"),
        max_rc_creation_adjustment: json!({"amount": "10"}),
        rc_manabar: json!({"current_mana": "900"}),
    });

    let info = adapter.api_get_accounts_info(&["alice".to_string()]).await.unwrap();

    assert_eq!(info.accounts.len(), 1);
    assert_eq!(info.accounts[0].extra["max_rc"], json!("1000"));
    assert_eq!(info.accounts[0].extra["rc_manabar"]["current_mana"], "900");
}

#[tokio::test]
async fn claim_sends_pending_balances() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    gateway.insert_account(account("alice", "STMalice"));

    let outcome = adapter
        .claim_reward_balance(&SigningKey::new("5Kalice"), "alice")
        .await
        .unwrap();

    let claim = gateway.claims().remove(0);
    assert_eq!(claim.account, "alice");
    assert_eq!(claim.balances.reward_steem, "1.000 STEEM");
    assert_eq!(claim.balances.reward_sbd.as_deref(), Some("0.500 SBD"));
    assert_eq!(claim.balances.reward_vests, "10.000000 VESTS");
    assert_eq!(outcome.account.reward_steem_balance, None);
}

#[tokio::test]
async fn wls_claim_has_no_dollar_balance() {
    let (adapter, gateway) = adapter(ChainName::Wls);
    gateway.insert_account(account("alice", "WLSalice"));

    adapter
        .claim_reward_balance(&SigningKey::new("5Kalice"), "alice")
        .await
        .unwrap();

    assert_eq!(gateway.claims()[0].balances.reward_sbd, None);
}

#[tokio::test]
async fn claim_for_unknown_account_fails() {
    let (adapter, gateway) = adapter(ChainName::Steem);

    assert_matches!(
        adapter.claim_reward_balance(&SigningKey::new("5K"), "nobody").await,
        Err(AdapterError::AccountNotFound { .. })
    );
    assert!(gateway.claims().is_empty());
}

#[tokio::test]
async fn load_post_reads_metadata() {
    let (adapter, gateway) = adapter(ChainName::Viz);
    gateway.insert_content(post(
        "alice",
        "trip",
        r#"{"tags":["travel"],"image":["https://img.example/1.png"]}"#,
    ));

    let summary = adapter.load_post("https://viz.world/@alice/trip").await.unwrap();

    assert_eq!(summary.title, "Existing");
    assert_eq!(summary.tags, vec!["travel"]);
    assert_eq!(summary.images, vec!["https://img.example/1.png"]);
}

#[tokio::test]
async fn cyrillic_post_permlink_matches_tag_prefix() {
    let (adapter, _gateway) = adapter(ChainName::Golos);
    let request = BroadcastCommentRequest::new(
        "alice",
        "5Kalice",
        "hi",
        BroadcastOptions::post("Привіт друзі", vec!["Привіт".into()]),
    );

    let batch = adapter
        .builder()
        .build_post_or_comment_operations(&request)
        .await
        .unwrap();

    let comment = batch.comment().unwrap();
    assert_eq!(comment.permlink, "ru--privit-druzi");
    assert_eq!(comment.parent_permlink, "ru--privit");
}

#[tokio::test]
async fn busy_flag_is_released_when_permlink_check_fails() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    let mut batch = adapter.builder().build_publish_operations(
        "alice",
        "Hello World",
        "hi",
        &["test".to_string()],
        &PublishOptions::default(),
    );
    gateway.fail_content_lookups(Some("node down"));

    let result = adapter.dispatch(&mut batch, &[SigningKey::new("5Kalice")]).await;

    assert_matches!(result, Err(AdapterError::Broadcast { chain, .. }) => assert_eq!(chain, "steem"));
    assert!(!adapter.connection().is_busy());
    assert!(gateway.broadcasts().is_empty());

    gateway.fail_content_lookups(None);
    adapter
        .dispatch(&mut batch, &[SigningKey::new("5Kalice")])
        .await
        .unwrap();
    assert_eq!(gateway.broadcasts().len(), 1);
}

#[tokio::test]
async fn oversized_beneficiary_share_is_rejected() {
    let (adapter, gateway) = adapter(ChainName::Steem);
    let request = BroadcastCommentRequest::new(
        "alice",
        "5Kalice",
        "hi",
        BroadcastOptions::post("Shared", vec!["test".into()])
            .with_beneficiaries(vec![BeneficiaryShare::new("a", 1000)]),
    );

    let result = adapter.broadcast_comment(request).await;

    assert_matches!(result, Err(AdapterError::Validation(errors)) => {
        assert_eq!(errors[0].field, "beneficiaries[0]");
    });
    assert!(gateway.content_lookups().is_empty());
}
