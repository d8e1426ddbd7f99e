//! End-to-end tests for the marketplace core: the full journey from
//! posting a task through bidding, assignment, execution, completion,
//! and review, plus the races the accept flow must win cleanly.

use std::sync::Arc;
use taskbay_market::*;
use taskbay_storage::{BackendType, StorageConfig, StorageEngine};
use taskbay_types::{
    Actor, Amount, BidStatus, NotificationKind, Role, TaskStatus, UserId,
};

struct MarketFixture {
    coordinator: Arc<MarketCoordinator>,
    customer: Actor,
    tasker_a: Actor,
    tasker_b: Actor,
}

impl MarketFixture {
    fn new() -> Self {
        let storage = Arc::new(
            StorageEngine::new(StorageConfig {
                backend_type: BackendType::Memory,
            })
            .unwrap(),
        );
        let categories = Arc::new(StaticCategoryDirectory::from_tree([
            ("garden", vec!["lawn"]),
            ("handyman", vec![]),
        ]));
        let coordinator = Arc::new(MarketCoordinator::new(
            MarketConfig::default(),
            storage,
            categories,
            Arc::new(NoDelivery),
            Arc::new(NoDelivery),
        ));

        Self {
            coordinator,
            customer: Actor::new(
                UserId::from_bytes([1u8; 32]),
                Role::Customer,
                "Cass",
                "cass@example.com",
            ),
            tasker_a: Actor::new(
                UserId::from_bytes([2u8; 32]),
                Role::Tasker,
                "Alma",
                "alma@example.com",
            ),
            tasker_b: Actor::new(
                UserId::from_bytes([3u8; 32]),
                Role::Tasker,
                "Bruno",
                "bruno@example.com",
            ),
        }
    }

    fn draft(&self, budget_major: u64) -> TaskDraft {
        TaskDraft {
            title: "mow the lawn".into(),
            description: "front and back".into(),
            category: "garden".into(),
            subcategory: Some("lawn".into()),
            address: "12 Elm St, Berlin".into(),
            latitude: Some(52.52),
            longitude: Some(13.405),
            required_at: chrono::Utc::now(),
            duration_hours: 2,
            is_urgent: false,
            images: vec!["uploads/lawn-1.jpg".into()],
            budget: Amount::from_major(budget_major),
        }
    }

    fn bid(&self, task: &taskbay_types::Task, major: u64) -> BidDraft {
        BidDraft {
            task: task.id,
            amount: Amount::from_major(major),
            message: "I'm available".into(),
            estimated_hours: Some(2),
        }
    }
}

#[tokio::test]
async fn bid_war_accept_assigns_and_rejects_the_rest() {
    let fx = MarketFixture::new();
    let m = &fx.coordinator;

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(1000)).await.unwrap();
    assert_eq!(task.fees.platform_fee, Amount::from_major(50));
    assert_eq!(task.fees.total_paid_by_customer, Amount::from_major(1052));

    let bid_a = m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 500)).await.unwrap();
    let bid_b = m.bids.place_bid(&fx.tasker_b, fx.bid(&task, 400)).await.unwrap();

    let (winner, task) = m.bids.accept_bid(&fx.customer, &bid_b.id).await.unwrap();
    assert_eq!(winner.status, BidStatus::Accepted);
    assert_eq!(task.status, TaskStatus::Assigned);
    assert_eq!(task.assigned_to, Some(fx.tasker_b.id));

    let views = m.bids.bids_for_task(&fx.customer, &task.id).await.unwrap();
    let a = views.iter().find(|v| v.id == bid_a.id).unwrap();
    assert_eq!(a.status, BidStatus::Rejected);

    // Both taskers were notified: A of placement-then-rejection flow,
    // B of acceptance.
    let to_b = m.notifications.for_user(&fx.tasker_b.id).await.unwrap();
    assert!(to_b.iter().any(|n| n.kind == NotificationKind::BidAccepted));

    // The customer heard about both bids
    let to_customer = m.notifications.for_user(&fx.customer.id).await.unwrap();
    assert_eq!(
        to_customer
            .iter()
            .filter(|n| n.kind == NotificationKind::BidPlaced)
            .count(),
        2
    );
}

#[tokio::test]
async fn completion_round_trip_with_rejection_then_review() {
    let fx = MarketFixture::new();
    let m = &fx.coordinator;

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(200)).await.unwrap();
    let bid = m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 180)).await.unwrap();
    m.bids.accept_bid(&fx.customer, &bid.id).await.unwrap();

    m.lifecycle.start_task(&fx.tasker_a, &task.id).await.unwrap();

    // First attempt gets sent back
    m.lifecycle
        .request_completion(&fx.tasker_a, &task.id, Some("done".into()), None)
        .await
        .unwrap();
    let task_back = m
        .lifecycle
        .reject_completion(&fx.customer, &task.id, Some("incomplete".into()))
        .await
        .unwrap();
    assert_eq!(task_back.status, TaskStatus::InProgress);
    assert!(task_back.completion_note.is_none());

    // Second attempt sticks
    m.lifecycle
        .request_completion(&fx.tasker_a, &task.id, Some("really done".into()), None)
        .await
        .unwrap();
    let done = m
        .lifecycle
        .confirm_completion(&fx.customer, &task.id, Some("thanks".into()))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at.is_some());

    // Review unlocks only now
    let review = m
        .reviews
        .submit_review(&fx.customer, fx.tasker_a.id, &task.id, 5, Some("great".into()))
        .await
        .unwrap();
    assert_eq!(review.rating, 5);
    assert_eq!(review.task_title, "mow the lawn");

    let stats = m.reviews.rating_for(&fx.tasker_a.id).await.unwrap();
    assert_eq!(stats.total_reviews, 1);
    assert_eq!(stats.average_rating, 5.0);
}

#[tokio::test]
async fn review_is_locked_until_completion() {
    let fx = MarketFixture::new();
    let m = &fx.coordinator;

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(200)).await.unwrap();
    let bid = m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 180)).await.unwrap();
    m.bids.accept_bid(&fx.customer, &bid.id).await.unwrap();

    let err = m
        .reviews
        .submit_review(&fx.customer, fx.tasker_a.id, &task.id, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidState { .. }));
}

#[tokio::test]
async fn accept_racing_cancel_has_one_winner() {
    let fx = MarketFixture::new();
    let m = fx.coordinator.clone();

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(100)).await.unwrap();
    let bid = m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 90)).await.unwrap();

    let (m1, m2) = (m.clone(), m.clone());
    let (c1, c2) = (fx.customer.clone(), fx.customer.clone());
    let task_id = task.id;
    let accept = tokio::spawn(async move { m1.bids.accept_bid(&c1, &bid.id).await.map(|_| ()) });
    let cancel = tokio::spawn(async move { m2.lifecycle.cancel_task(&c2, &task_id).await.map(|_| ()) });

    let accept_result = accept.await.unwrap();
    let cancel_result = cancel.await.unwrap();

    // Either order is individually legal (cancelling an assigned task is
    // allowed), but a losing accept must fail with InvalidState and the
    // final state must be coherent either way.
    if let Err(e) = &accept_result {
        assert!(matches!(e, MarketError::InvalidState { .. }));
        assert!(cancel_result.is_ok());
    }

    let final_task = m.lifecycle.get_task(&task.id).await.unwrap();
    assert!(matches!(
        final_task.status,
        TaskStatus::Assigned | TaskStatus::Cancelled
    ));
    assert!(final_task.assignment_invariant_holds());

    let bids = m.bids.bids_for_task(&fx.customer, &task.id).await.unwrap();
    let accepted = bids.iter().filter(|b| b.status == BidStatus::Accepted).count();
    if final_task.status == TaskStatus::Assigned {
        assert!(accept_result.is_ok());
        assert_eq!(accepted, 1);
    } else if accept_result.is_err() {
        // Cancel won: the bid was never accepted, it was rejected
        assert_eq!(accepted, 0);
        assert!(bids.iter().all(|b| b.status == BidStatus::Rejected));
    }
}

#[tokio::test]
async fn tasker_annotation_shows_existing_bids_in_listings() {
    let fx = MarketFixture::new();
    let m = &fx.coordinator;

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(100)).await.unwrap();
    m.lifecycle.create_task(&fx.customer, fx.draft(150)).await.unwrap();
    let bid = m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 90)).await.unwrap();

    let page = m
        .search
        .search(&TaskQuery::default(), Some(&fx.tasker_a))
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let with_bid = page
        .tasks
        .iter()
        .filter(|l| l.my_bid.is_some())
        .collect::<Vec<_>>();
    assert_eq!(with_bid.len(), 1);
    assert_eq!(with_bid[0].my_bid.as_ref().unwrap().id, bid.id);
}

#[tokio::test]
async fn storage_stats_reflect_activity() {
    let fx = MarketFixture::new();
    let m = &fx.coordinator;

    let task = m.lifecycle.create_task(&fx.customer, fx.draft(100)).await.unwrap();
    m.bids.place_bid(&fx.tasker_a, fx.bid(&task, 90)).await.unwrap();

    let stats = m.storage_stats().await.unwrap();
    assert_eq!(stats.task_count, 1);
    assert_eq!(stats.bid_count, 1);
    assert_eq!(stats.notification_count, 1);
}
