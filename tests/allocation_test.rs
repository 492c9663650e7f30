mod common;

use assert_matches::assert_matches;
use stock_ledger::entities::audit_log_entry::AuditAction;
use stock_ledger::entities::stock_adjustment::{AdjustmentStatus, AdjustmentType};
use stock_ledger::errors::ServiceError;
use stock_ledger::services::adjustments::RequestAdjustmentCommand;
use stock_ledger::services::allocations::AllocateStockCommand;
use stock_ledger::services::audit::SUBJECT_ALLOCATIONS;
use uuid::Uuid;

use common::TestLedger;

fn allocate_cmd(batch_id: Uuid, quantity: i64) -> AllocateStockCommand {
    AllocateStockCommand {
        batch_id,
        storefront_id: Uuid::new_v4(),
        quantity,
        actor_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn allocation_checks_availability_net_of_approved_adjustments() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;
    let approver = Uuid::new_v4();

    // Approved shrinkage of 20 leaves 80 available.
    let adjustment = t
        .ledger
        .adjustments
        .request_adjustment(RequestAdjustmentCommand {
            batch_id: batch.id,
            quantity_delta: -20,
            adjustment_type: AdjustmentType::Damage,
            reason: "forklift incident".to_string(),
            requested_by: Uuid::new_v4(),
        })
        .await
        .unwrap();
    t.ledger
        .adjustments
        .approve_adjustment(adjustment.id, approver, false)
        .await
        .unwrap();

    t.ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 50))
        .await
        .unwrap();

    let availability = t.ledger.batches.get_availability(batch.id).await.unwrap();
    assert_eq!(availability.recorded_quantity, 100);
    assert_eq!(availability.approved_delta, -20);
    assert_eq!(availability.available, 80);
    assert_eq!(availability.already_allocated, 50);
    assert_eq!(availability.remaining, 30);

    // 40 > 30 remaining.
    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 40))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 80,
            already_allocated: 50,
            remaining: 30,
            requested_quantity: 40,
            ..
        }
    );

    // The failed attempt must not have consumed anything.
    assert_eq!(
        t.ledger.allocations.total_allocated(batch.id).await.unwrap(),
        50
    );
}

#[tokio::test]
async fn update_excludes_own_quantity_from_the_committed_total() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;
    let actor = Uuid::new_v4();

    let allocation = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 60))
        .await
        .unwrap();

    // Growing 60 -> 90 is fine because the old 60 is excluded from the check.
    let updated = t
        .ledger
        .allocations
        .update_allocation(allocation.id, 90, actor)
        .await
        .unwrap();
    assert_eq!(updated.quantity, 90);

    let err = t
        .ledger
        .allocations
        .update_allocation(allocation.id, 110, actor)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            remaining: 100,
            requested_quantity: 110,
            ..
        }
    );

    // Failed update leaves the previous quantity in place.
    let current = t
        .ledger
        .allocations
        .get_allocation(allocation.id)
        .await
        .unwrap();
    assert_eq!(current.quantity, 90);
}

#[tokio::test]
async fn negative_availability_blocks_any_allocation() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;

    // Corrupted state staged directly: availability is 100 - 150 = -50.
    t.insert_raw_adjustment(batch.id, -150, AdjustmentStatus::Approved)
        .await;

    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 10))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NegativeAvailability { available: -50, .. });

    // Even a zero-quantity request is refused while availability is negative.
    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 0))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NegativeAvailability { .. });
}

#[tokio::test]
async fn release_frees_capacity_for_new_allocations() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;
    let actor = Uuid::new_v4();

    let allocation = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 100))
        .await
        .unwrap();

    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { remaining: 0, .. });

    t.ledger
        .allocations
        .release_allocation(allocation.id, actor)
        .await
        .unwrap();

    t.ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, 60))
        .await
        .unwrap();
    assert_eq!(
        t.ledger.allocations.total_allocated(batch.id).await.unwrap(),
        60
    );

    // The released row is gone.
    let err = t
        .ledger
        .allocations
        .get_allocation(allocation.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn every_allocation_mutation_lands_in_the_audit_log() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(100).await;
    let actor = Uuid::new_v4();

    let allocation = t
        .ledger
        .allocations
        .allocate_stock(AllocateStockCommand {
            batch_id: batch.id,
            storefront_id: Uuid::new_v4(),
            quantity: 40,
            actor_id: actor,
        })
        .await
        .unwrap();
    t.ledger
        .allocations
        .update_allocation(allocation.id, 25, actor)
        .await
        .unwrap();
    t.ledger
        .allocations
        .release_allocation(allocation.id, actor)
        .await
        .unwrap();

    let trail = t
        .ledger
        .audit
        .get_subject_trail(SUBJECT_ALLOCATIONS, allocation.id, None, 10)
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);

    // Newest first.
    assert_eq!(trail[0].action, AuditAction::AllocationReleased.as_str());
    assert_eq!(trail[1].action, AuditAction::AllocationUpdated.as_str());
    assert_eq!(trail[2].action, AuditAction::AllocationCreated.as_str());

    for entry in &trail {
        assert_eq!(entry.batch_id, batch.id);
        assert_eq!(entry.actor_id, actor);
    }

    let update_entry = &trail[1];
    assert_eq!(
        update_entry.old_value.as_ref().unwrap()["quantity"],
        serde_json::json!(40)
    );
    assert_eq!(
        update_entry.new_value.as_ref().unwrap()["quantity"],
        serde_json::json!(25)
    );
}

#[tokio::test]
async fn allocation_input_validation() {
    let t = TestLedger::new().await;
    let batch = t.seed_batch(10).await;

    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(batch.id, -5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = t
        .ledger
        .allocations
        .allocate_stock(allocate_cmd(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = t
        .ledger
        .allocations
        .update_allocation(Uuid::new_v4(), 1, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
