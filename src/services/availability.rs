//! Quantity arithmetic and availability decision functions.
//!
//! Everything in this module is pure: it takes a snapshot of batch,
//! adjustment and allocation state and returns a typed decision. Loading the
//! snapshot and acting on the decision happen inside the caller's
//! transaction, so these functions never see stale state.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Sums a recorded batch quantity with a set of adjustment deltas.
///
/// Total over integers; the result may be negative in a what-if computation,
/// but the validators below guarantee negative results are never committed.
pub fn available_quantity<I>(recorded: i64, deltas: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    deltas.into_iter().fold(recorded, |acc, delta| acc + delta)
}

/// Snapshot of one batch's availability arithmetic, taken inside a
/// transaction. Never persisted; always recomputed from the source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchAvailability {
    pub batch_id: Uuid,
    pub recorded_quantity: i64,
    pub approved_delta: i64,
    pub available: i64,
    pub already_allocated: i64,
    pub remaining: i64,
}

impl BatchAvailability {
    pub fn compute(
        batch_id: Uuid,
        recorded_quantity: i64,
        approved_deltas: &[i64],
        allocated_quantities: &[i64],
    ) -> Self {
        let approved_delta: i64 = approved_deltas.iter().sum();
        let available = available_quantity(recorded_quantity, approved_deltas.iter().copied());
        let already_allocated: i64 = allocated_quantities.iter().sum();

        Self {
            batch_id,
            recorded_quantity,
            approved_delta,
            available,
            already_allocated,
            remaining: available - already_allocated,
        }
    }
}

/// Decides whether `requested_quantity` may be committed to a storefront.
///
/// A batch whose historical losses already exceed its recorded stock is
/// rejected with `NegativeAvailability` regardless of the requested quantity;
/// that is a data-integrity signal, not a sizing problem.
pub fn check_allocation(
    availability: &BatchAvailability,
    requested_quantity: i64,
) -> Result<(), ServiceError> {
    if availability.available < 0 {
        return Err(ServiceError::NegativeAvailability {
            batch_id: availability.batch_id,
            recorded_quantity: availability.recorded_quantity,
            approved_delta: availability.approved_delta,
            available: availability.available,
        });
    }

    if requested_quantity > availability.remaining {
        return Err(ServiceError::InsufficientStock {
            batch_id: availability.batch_id,
            recorded_quantity: availability.recorded_quantity,
            approved_delta: availability.approved_delta,
            available: availability.available,
            already_allocated: availability.already_allocated,
            remaining: availability.remaining,
            requested_quantity,
        });
    }

    Ok(())
}

/// The figures behind an approval decision, echoed into the audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApprovalCheck {
    pub batch_id: Uuid,
    pub recorded_quantity: i64,
    pub allocated: i64,
    pub other_delta: i64,
    pub quantity_delta: i64,
    pub new_available: i64,
}

/// Decides whether a pending adjustment may be finalized.
///
/// Gains (`quantity_delta >= 0`) only increase availability and always pass.
/// Losses must neither drive availability below zero nor below the quantity
/// already committed to storefronts; the negative-availability check runs
/// first, otherwise the floor check (`allocated >= 0`) would absorb every
/// below-zero outcome.
pub fn check_adjustment_approval(
    batch_id: Uuid,
    recorded_quantity: i64,
    other_delta: i64,
    allocated: i64,
    quantity_delta: i64,
) -> Result<ApprovalCheck, ServiceError> {
    let new_available = recorded_quantity + other_delta + quantity_delta;
    let check = ApprovalCheck {
        batch_id,
        recorded_quantity,
        allocated,
        other_delta,
        quantity_delta,
        new_available,
    };

    if quantity_delta >= 0 {
        return Ok(check);
    }

    if new_available < 0 {
        return Err(ServiceError::WouldGoNegative {
            batch_id,
            recorded_quantity,
            allocated,
            other_delta,
            quantity_delta,
            new_available,
        });
    }

    if new_available < allocated {
        return Err(ServiceError::BelowAllocatedFloor {
            batch_id,
            recorded_quantity,
            allocated,
            other_delta,
            quantity_delta,
            new_available,
        });
    }

    Ok(check)
}
