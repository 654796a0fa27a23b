//! End-to-end behavior of a fully wired node

use std::sync::Arc;
use std::time::Duration;

use agora_core::{MockChangeFeed, RowChange, SyncEvent, SyncEventKind, Topic, UserId};
use agora_node::{AgoraNode, NodeConfig, NodeError};
use agora_ranking::{Candidate, RankingContext, RankingCriteria};
use agora_referral::{ConversionKind, InMemoryReferralStore};
use agora_sync::{ConnectionState, Submission};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

fn item_events(node: &AgoraNode) -> mpsc::UnboundedReceiver<SyncEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    node.sync().register("test", move |event| {
        if event.kind() != SyncEventKind::ConnectionStateChanged {
            let _ = tx.send(event.clone());
        }
        Ok(())
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within timeout")
        .expect("listener still registered")
}

#[tokio::test]
async fn test_start_delivers_changes_and_shutdown_stops() {
    let feed = Arc::new(MockChangeFeed::new());
    let node = AgoraNode::in_memory(
        NodeConfig::default(),
        feed.clone(),
        Arc::new(InMemoryReferralStore::new()),
    )
    .unwrap();
    let mut rx = item_events(&node);

    assert_ok!(node.start().await);
    assert!(node.is_started());
    assert_eq!(node.sync().state(), ConnectionState::Connected);
    assert_eq!(feed.active_subscriptions(), 3);

    feed.push(
        Topic::Items,
        RowChange::insert(json!({"id": "lamp", "seller_id": "s1"})),
    );
    let event = next(&mut rx).await;
    assert_eq!(event.kind(), SyncEventKind::ItemCreated);
    assert_eq!(event.subject_id().unwrap().as_str(), "lamp");

    assert_ok!(node.shutdown().await);
    assert!(!node.is_started());
    assert_eq!(node.sync().state(), ConnectionState::Disconnected);
    assert_eq!(feed.active_subscriptions(), 0);
    assert_eq!(node.sync().listener_count(), 0);

    // Repeated shutdown is harmless
    assert_ok!(node.shutdown().await);
}

#[tokio::test]
async fn test_lifecycle_guards() {
    let node = AgoraNode::in_memory(
        NodeConfig::default(),
        Arc::new(MockChangeFeed::new()),
        Arc::new(InMemoryReferralStore::new()),
    )
    .unwrap();

    assert!(matches!(node.refresh().await, Err(NodeError::NotStarted)));
    assert_ok!(node.start().await);
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    assert_ok!(node.refresh().await);
    assert_ok!(node.shutdown().await);
}

#[tokio::test]
async fn test_invalid_ranking_criteria_rejected() {
    let config = NodeConfig::default().with_ranking(RankingCriteria::new(0.5, 0.5, 0.5));
    let result = AgoraNode::in_memory(
        config,
        Arc::new(MockChangeFeed::new()),
        Arc::new(InMemoryReferralStore::new()),
    );
    assert!(matches!(result, Err(NodeError::Ranking(_))));
}

#[tokio::test]
async fn test_referral_points_lift_seller_in_ranking() {
    let node = AgoraNode::in_memory(
        NodeConfig::default(),
        Arc::new(MockChangeFeed::new()),
        Arc::new(InMemoryReferralStore::new()),
    )
    .unwrap();
    let accounting = node.accounting();

    let referrer = UserId::from("seller-a");
    let code = accounting.referral_code_for(&referrer).await.unwrap();
    let relationship = accounting
        .register_referral(&code, &UserId::from("buyer"))
        .await
        .unwrap();
    let award = accounting
        .award_points(&relationship.id, ConversionKind::SuccessfulSale, json!({}))
        .await
        .unwrap();
    assert!(award.is_new());

    let candidates = vec![
        Candidate::new("plain", "seller-b", 40.0).with_distance_km(5.0),
        Candidate::new("boosted", "seller-a", 40.0).with_distance_km(5.0),
    ];
    let ranking = node
        .rank(candidates, &RankingContext::default())
        .await
        .unwrap();

    assert!(!ranking.referral_degraded);
    assert_eq!(ranking.candidates[0].item_id.as_str(), "boosted");
    assert_eq!(ranking.candidates[0].referral_points_of_seller, 50);
    assert_eq!(ranking.candidates[1].referral_points_of_seller, 0);
}

#[tokio::test]
async fn test_offline_events_survive_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::with_data_dir(dir.path());

    {
        let feed = Arc::new(MockChangeFeed::new());
        feed.set_unavailable(true);
        let node = AgoraNode::new(
            config.clone(),
            feed,
            Arc::new(InMemoryReferralStore::new()),
        )
        .await
        .unwrap();

        assert!(matches!(
            assert_err!(node.start().await),
            NodeError::Sync(_)
        ));
        let submitted = node
            .sync()
            .emit(SyncEvent::new(
                SyncEventKind::ItemFavorited,
                Some("chair".into()),
                Some("u1".into()),
                None,
            ))
            .await;
        assert_eq!(submitted, Submission::Queued { evicted: 0 });
        assert_ok!(node.shutdown().await);
    }

    let node = AgoraNode::new(
        config,
        Arc::new(MockChangeFeed::new()),
        Arc::new(InMemoryReferralStore::new()),
    )
    .await
    .unwrap();
    assert_eq!(node.sync().queued_len().await, 1);

    let mut rx = item_events(&node);
    assert_ok!(node.start().await);

    let replayed = next(&mut rx).await;
    assert_eq!(replayed.kind(), SyncEventKind::ItemFavorited);
    assert_eq!(replayed.subject_id().unwrap().as_str(), "chair");
    assert_eq!(node.sync().queued_len().await, 0);
    assert!(node.sync().last_sync_at().await.unwrap().is_some());

    assert_ok!(node.shutdown().await);
}
