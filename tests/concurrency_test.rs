mod common;

use assert_matches::assert_matches;
use stock_ledger::entities::stock_adjustment::AdjustmentType;
use stock_ledger::errors::ServiceError;
use stock_ledger::services::adjustments::RequestAdjustmentCommand;
use stock_ledger::services::allocations::AllocateStockCommand;
use uuid::Uuid;

use common::{with_retry, TestLedger};

#[tokio::test]
async fn racing_allocations_cannot_both_win_the_last_units() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;

    // Two storefronts race for 60 units each against 100 available. Whatever
    // the interleaving, exactly one can win.
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let allocations = t.ledger.allocations.clone();
        let batch_id = batch.id;
        tasks.push(tokio::spawn(async move {
            with_retry(|| {
                allocations.allocate_stock(AllocateStockCommand {
                    batch_id,
                    storefront_id: Uuid::new_v4(),
                    quantity: 60,
                    actor_id: Uuid::new_v4(),
                })
            })
            .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => {
                assert_matches!(
                    err,
                    ServiceError::InsufficientStock {
                        remaining: 40,
                        requested_quantity: 60,
                        ..
                    }
                );
            }
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(
        t.ledger.allocations.total_allocated(batch.id).await.unwrap(),
        60
    );
}

#[tokio::test]
async fn allocations_never_oversubscribe_under_load() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let allocations = t.ledger.allocations.clone();
        let batch_id = batch.id;
        tasks.push(tokio::spawn(async move {
            with_retry(|| {
                allocations.allocate_stock(AllocateStockCommand {
                    batch_id,
                    storefront_id: Uuid::new_v4(),
                    quantity: 30,
                    actor_id: Uuid::new_v4(),
                })
            })
            .await
            .is_ok()
        }));
    }

    let successes = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|outcome| *outcome.as_ref().unwrap())
        .count();

    // 3 x 30 fits in 100; a fourth would need 120.
    assert_eq!(successes, 3);

    let availability = t.ledger.batches.get_availability(batch.id).await.unwrap();
    assert_eq!(availability.already_allocated, 90);
    assert_eq!(availability.remaining, 10);
}

#[tokio::test]
async fn racing_approvers_of_one_adjustment_produce_a_single_transition() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;

    let adjustment = t
        .ledger
        .adjustments
        .request_adjustment(RequestAdjustmentCommand {
            batch_id: batch.id,
            quantity_delta: -10,
            adjustment_type: AdjustmentType::Theft,
            reason: "shrink audit".to_string(),
            requested_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let adjustments = t.ledger.adjustments.clone();
        let adjustment_id = adjustment.id;
        tasks.push(tokio::spawn(async move {
            with_retry(|| adjustments.approve_adjustment(adjustment_id, Uuid::new_v4(), false))
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => {
                assert_matches!(err, ServiceError::InvalidTransition { ref from, .. } if from == "APPROVED");
            }
        }
    }
    assert_eq!(successes, 1);

    // The delta was applied exactly once.
    assert_eq!(
        t.ledger
            .batches
            .get_available_quantity(batch.id)
            .await
            .unwrap(),
        90
    );
}

#[tokio::test]
async fn racing_loss_approvals_respect_the_combined_floor() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;

    // Two independent -60 losses: either alone passes, both together would
    // drive availability to -20, so the second decider must refuse.
    let mut ids = Vec::new();
    for _ in 0..2 {
        let adjustment = t
            .ledger
            .adjustments
            .request_adjustment(RequestAdjustmentCommand {
                batch_id: batch.id,
                quantity_delta: -60,
                adjustment_type: AdjustmentType::Damage,
                reason: "water damage".to_string(),
                requested_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        ids.push(adjustment.id);
    }

    let mut tasks = Vec::new();
    for adjustment_id in ids {
        let adjustments = t.ledger.adjustments.clone();
        tasks.push(tokio::spawn(async move {
            with_retry(|| adjustments.approve_adjustment(adjustment_id, Uuid::new_v4(), false))
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => {
                assert_matches!(
                    err,
                    ServiceError::WouldGoNegative {
                        other_delta: -60,
                        quantity_delta: -60,
                        new_available: -20,
                        ..
                    }
                );
            }
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(
        t.ledger
            .batches
            .get_available_quantity(batch.id)
            .await
            .unwrap(),
        40
    );
}
