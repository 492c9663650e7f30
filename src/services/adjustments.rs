//! Adjustment Ledger: proposed and finalized quantity deltas with an
//! approval workflow.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::entities::audit_log_entry::AuditAction;
use crate::entities::stock_adjustment::{
    self, AdjustmentStatus, AdjustmentType, Entity as StockAdjustment,
};
use crate::entities::stock_batch::Entity as StockBatch;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{AuditService, NewAuditEntry, SUBJECT_ADJUSTMENTS};
use crate::services::availability::check_adjustment_approval;

/// Input contract for an adjustment workflow (an external collaborator).
#[derive(Debug, Clone)]
pub struct RequestAdjustmentCommand {
    pub batch_id: Uuid,
    pub quantity_delta: i64,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub requested_by: Uuid,
}

/// Service owning adjustment rows and their status lifecycle.
#[derive(Clone)]
pub struct AdjustmentService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl AdjustmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a proposed delta as PENDING. No validation beyond shape: a
    /// pending adjustment contributes nothing to availability.
    #[instrument(skip(self))]
    pub async fn request_adjustment(
        &self,
        command: RequestAdjustmentCommand,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        if command.quantity_delta == 0 {
            return Err(ServiceError::ValidationError(
                "quantity_delta must be non-zero".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        StockBatch::find_by_id(command.batch_id)
            .one(db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock batch {} not found", command.batch_id))
            })?;

        let now = Utc::now();
        let adjustment = stock_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_batch_id: Set(command.batch_id),
            quantity_delta: Set(command.quantity_delta),
            adjustment_type: Set(command.adjustment_type.as_str().to_string()),
            status: Set(AdjustmentStatus::Pending.as_str().to_string()),
            reason: Set(command.reason),
            requested_by: Set(command.requested_by),
            approved_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::from_db)?;

        info!(
            adjustment_id = %adjustment.id,
            batch_id = %adjustment.stock_batch_id,
            quantity_delta = adjustment.quantity_delta,
            adjustment_type = %adjustment.adjustment_type,
            "Adjustment requested"
        );

        self.event_sender
            .notify(Event::AdjustmentRequested {
                adjustment_id: adjustment.id,
                batch_id: adjustment.stock_batch_id,
                quantity_delta: adjustment.quantity_delta,
            })
            .await;

        Ok(adjustment)
    }

    /// Finalizes a pending adjustment as APPROVED, or COMPLETED when
    /// `complete` is set.
    ///
    /// Gains always pass. Losses are validated against the batch's allocated
    /// floor and the zero floor inside one transaction holding the batch row;
    /// the decision and its audit entry commit together.
    #[instrument(skip(self))]
    pub async fn approve_adjustment(
        &self,
        adjustment_id: Uuid,
        approver_id: Uuid,
        complete: bool,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let target = if complete {
            AdjustmentStatus::Completed
        } else {
            AdjustmentStatus::Approved
        };

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        // First read resolves the batch; status is re-checked under the lock
        // because a competing approver may have won the race.
        let adjustment = find_adjustment(&txn, adjustment_id).await?;
        require_transition(&adjustment, target)?;

        let batch = db::lock_batch(&txn, adjustment.stock_batch_id).await?;
        let adjustment = find_adjustment(&txn, adjustment_id).await?;
        require_transition(&adjustment, target)?;

        let other_deltas = super::approved_deltas(&txn, batch.id, Some(adjustment.id)).await?;
        let other_delta: i64 = other_deltas.iter().sum();
        let allocated = super::allocated_total(&txn, batch.id).await?;

        let check = check_adjustment_approval(
            batch.id,
            batch.recorded_quantity,
            other_delta,
            allocated,
            adjustment.quantity_delta,
        )?;

        let old_status = adjustment.status.clone();
        let mut active: stock_adjustment::ActiveModel = adjustment.into();
        active.status = Set(target.as_str().to_string());
        active.approved_by = Set(Some(approver_id));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::from_db)?;

        let action = if complete {
            AuditAction::AdjustmentCompleted
        } else {
            AuditAction::AdjustmentApproved
        };
        AuditService::record(
            &txn,
            NewAuditEntry {
                batch_id: batch.id,
                subject_table: SUBJECT_ADJUSTMENTS,
                subject_id: updated.id,
                action,
                old_value: Some(json!({ "status": old_status })),
                new_value: Some(json!({ "status": target.as_str() })),
                actor_id: approver_id,
                metadata: Some(json!({
                    "recorded_quantity": check.recorded_quantity,
                    "allocated": check.allocated,
                    "other_delta": check.other_delta,
                    "quantity_delta": check.quantity_delta,
                    "new_available": check.new_available,
                })),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            adjustment_id = %updated.id,
            batch_id = %batch.id,
            quantity_delta = updated.quantity_delta,
            new_available = check.new_available,
            status = %updated.status,
            "Adjustment finalized"
        );

        let event = if complete {
            Event::AdjustmentCompleted {
                adjustment_id: updated.id,
                batch_id: batch.id,
                quantity_delta: updated.quantity_delta,
                new_available: check.new_available,
            }
        } else {
            Event::AdjustmentApproved {
                adjustment_id: updated.id,
                batch_id: batch.id,
                quantity_delta: updated.quantity_delta,
                new_available: check.new_available,
            }
        };
        self.event_sender.notify(event).await;

        Ok(updated)
    }

    /// Rejects a pending adjustment. Needs no availability validation (a
    /// rejected delta contributes zero), but still serializes on the batch so
    /// racing deciders cannot both transition the row.
    #[instrument(skip(self))]
    pub async fn reject_adjustment(
        &self,
        adjustment_id: Uuid,
        approver_id: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        let adjustment = find_adjustment(&txn, adjustment_id).await?;
        require_transition(&adjustment, AdjustmentStatus::Rejected)?;

        let batch = db::lock_batch(&txn, adjustment.stock_batch_id).await?;
        let adjustment = find_adjustment(&txn, adjustment_id).await?;
        require_transition(&adjustment, AdjustmentStatus::Rejected)?;

        let old_status = adjustment.status.clone();
        let quantity_delta = adjustment.quantity_delta;
        let mut active: stock_adjustment::ActiveModel = adjustment.into();
        active.status = Set(AdjustmentStatus::Rejected.as_str().to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::from_db)?;

        AuditService::record(
            &txn,
            NewAuditEntry {
                batch_id: batch.id,
                subject_table: SUBJECT_ADJUSTMENTS,
                subject_id: updated.id,
                action: AuditAction::AdjustmentRejected,
                old_value: Some(json!({ "status": old_status })),
                new_value: Some(json!({ "status": AdjustmentStatus::Rejected.as_str() })),
                actor_id: approver_id,
                metadata: Some(json!({ "quantity_delta": quantity_delta })),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            adjustment_id = %updated.id,
            batch_id = %batch.id,
            "Adjustment rejected"
        );

        self.event_sender
            .notify(Event::AdjustmentRejected {
                adjustment_id: updated.id,
                batch_id: batch.id,
            })
            .await;

        Ok(updated)
    }

    /// Fetches one adjustment.
    #[instrument(skip(self))]
    pub async fn get_adjustment(
        &self,
        adjustment_id: Uuid,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        find_adjustment(self.db_pool.as_ref(), adjustment_id).await
    }

    /// All adjustments for a batch, oldest first.
    #[instrument(skip(self))]
    pub async fn list_adjustments_for_batch(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<stock_adjustment::Model>, ServiceError> {
        StockAdjustment::find()
            .filter(stock_adjustment::Column::StockBatchId.eq(batch_id))
            .order_by_asc(stock_adjustment::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::from_db)
    }
}

async fn find_adjustment<C: ConnectionTrait>(
    conn: &C,
    adjustment_id: Uuid,
) -> Result<stock_adjustment::Model, ServiceError> {
    StockAdjustment::find_by_id(adjustment_id)
        .one(conn)
        .await
        .map_err(ServiceError::from_db)?
        .ok_or_else(|| ServiceError::NotFound(format!("Adjustment {} not found", adjustment_id)))
}

fn require_transition(
    adjustment: &stock_adjustment::Model,
    target: AdjustmentStatus,
) -> Result<(), ServiceError> {
    let current = adjustment.adjustment_status().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Adjustment {} has unrecognized status '{}'",
            adjustment.id, adjustment.status
        ))
    })?;

    if !current.can_transition_to(target) {
        return Err(ServiceError::InvalidTransition {
            adjustment_id: adjustment.id,
            from: current.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }

    Ok(())
}
