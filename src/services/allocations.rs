//! Allocation Store: quantities of a batch committed to storefronts.
//!
//! Every mutation runs a validate-then-write sequence inside one transaction
//! holding the batch row, so two allocations against the same batch can never
//! both read a stale availability figure and both succeed.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::audit_log_entry::AuditAction;
use crate::entities::stock_allocation::{self, Entity as StockAllocation};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{AuditService, NewAuditEntry, SUBJECT_ALLOCATIONS};
use crate::services::availability::check_allocation;

/// Input contract for a transfer request (an external collaborator).
#[derive(Debug, Clone, Validate)]
pub struct AllocateStockCommand {
    pub batch_id: Uuid,
    pub storefront_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i64,
    pub actor_id: Uuid,
}

/// Service owning allocation rows.
#[derive(Clone)]
pub struct AllocationService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl AllocationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Commits a quantity of a batch to a storefront.
    #[instrument(skip(self))]
    pub async fn allocate_stock(
        &self,
        command: AllocateStockCommand,
    ) -> Result<stock_allocation::Model, ServiceError> {
        command.validate()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        let batch = db::lock_batch(&txn, command.batch_id).await?;
        let availability = super::load_availability(&txn, &batch, None).await?;
        check_allocation(&availability, command.quantity)?;

        let now = Utc::now();
        let allocation = stock_allocation::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_batch_id: Set(batch.id),
            storefront_id: Set(command.storefront_id),
            quantity: Set(command.quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::from_db)?;

        let remaining = availability.remaining - command.quantity;
        AuditService::record(
            &txn,
            NewAuditEntry {
                batch_id: batch.id,
                subject_table: SUBJECT_ALLOCATIONS,
                subject_id: allocation.id,
                action: AuditAction::AllocationCreated,
                old_value: None,
                new_value: Some(json!({
                    "storefront_id": command.storefront_id,
                    "quantity": command.quantity,
                })),
                actor_id: command.actor_id,
                metadata: Some(json!({
                    "recorded_quantity": availability.recorded_quantity,
                    "approved_delta": availability.approved_delta,
                    "available": availability.available,
                    "already_allocated": availability.already_allocated,
                    "remaining": remaining,
                })),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            allocation_id = %allocation.id,
            batch_id = %batch.id,
            storefront_id = %command.storefront_id,
            quantity = command.quantity,
            remaining,
            "Stock allocated to storefront"
        );

        self.event_sender
            .notify(Event::StockAllocated {
                allocation_id: allocation.id,
                batch_id: batch.id,
                storefront_id: command.storefront_id,
                quantity: command.quantity,
                remaining,
            })
            .await;

        Ok(allocation)
    }

    /// Replaces an allocation's quantity, re-validating against availability
    /// with the allocation's own current quantity excluded.
    #[instrument(skip(self))]
    pub async fn update_allocation(
        &self,
        allocation_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
    ) -> Result<stock_allocation::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Allocation quantity must not be negative".to_string(),
            ));
        }

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        // First read resolves the batch; the authoritative read happens after
        // the batch row is held.
        let existing = find_allocation(&txn, allocation_id).await?;
        let batch = db::lock_batch(&txn, existing.stock_batch_id).await?;
        let existing = find_allocation(&txn, allocation_id).await?;

        let availability = super::load_availability(&txn, &batch, Some(allocation_id)).await?;
        check_allocation(&availability, quantity)?;

        let old_quantity = existing.quantity;
        let mut active: stock_allocation::ActiveModel = existing.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::from_db)?;

        AuditService::record(
            &txn,
            NewAuditEntry {
                batch_id: batch.id,
                subject_table: SUBJECT_ALLOCATIONS,
                subject_id: updated.id,
                action: AuditAction::AllocationUpdated,
                old_value: Some(json!({ "quantity": old_quantity })),
                new_value: Some(json!({ "quantity": quantity })),
                actor_id,
                metadata: Some(json!({
                    "recorded_quantity": availability.recorded_quantity,
                    "approved_delta": availability.approved_delta,
                    "available": availability.available,
                    "already_allocated": availability.already_allocated,
                    "remaining": availability.remaining - quantity,
                })),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            allocation_id = %updated.id,
            batch_id = %batch.id,
            old_quantity,
            new_quantity = quantity,
            "Allocation updated"
        );

        self.event_sender
            .notify(Event::AllocationUpdated {
                allocation_id: updated.id,
                batch_id: batch.id,
                old_quantity,
                new_quantity: quantity,
            })
            .await;

        Ok(updated)
    }

    /// Releases an allocation when stock is returned or reallocated. Frees
    /// capacity, so no availability validation is needed.
    #[instrument(skip(self))]
    pub async fn release_allocation(
        &self,
        allocation_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        let existing = find_allocation(&txn, allocation_id).await?;
        let batch = db::lock_batch(&txn, existing.stock_batch_id).await?;
        let existing = find_allocation(&txn, allocation_id).await?;

        let quantity = existing.quantity;
        existing
            .clone()
            .delete(&txn)
            .await
            .map_err(ServiceError::from_db)?;

        AuditService::record(
            &txn,
            NewAuditEntry {
                batch_id: batch.id,
                subject_table: SUBJECT_ALLOCATIONS,
                subject_id: allocation_id,
                action: AuditAction::AllocationReleased,
                old_value: Some(json!({
                    "storefront_id": existing.storefront_id,
                    "quantity": quantity,
                })),
                new_value: None,
                actor_id,
                metadata: Some(json!({ "batch_id": batch.id })),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::from_db)?;

        info!(
            allocation_id = %allocation_id,
            batch_id = %batch.id,
            quantity,
            "Allocation released"
        );

        self.event_sender
            .notify(Event::AllocationReleased {
                allocation_id,
                batch_id: batch.id,
                quantity,
            })
            .await;

        Ok(())
    }

    /// Fetches one allocation.
    #[instrument(skip(self))]
    pub async fn get_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<stock_allocation::Model, ServiceError> {
        find_allocation(self.db_pool.as_ref(), allocation_id).await
    }

    /// All allocations for a batch, oldest first.
    #[instrument(skip(self))]
    pub async fn list_allocations_for_batch(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<stock_allocation::Model>, ServiceError> {
        StockAllocation::find()
            .filter(stock_allocation::Column::StockBatchId.eq(batch_id))
            .order_by_asc(stock_allocation::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::from_db)
    }

    /// Total quantity of a batch committed to storefronts.
    #[instrument(skip(self))]
    pub async fn total_allocated(&self, batch_id: Uuid) -> Result<i64, ServiceError> {
        super::allocated_total(self.db_pool.as_ref(), batch_id).await
    }
}

async fn find_allocation<C: sea_orm::ConnectionTrait>(
    conn: &C,
    allocation_id: Uuid,
) -> Result<stock_allocation::Model, ServiceError> {
    StockAllocation::find_by_id(allocation_id)
        .one(conn)
        .await
        .map_err(ServiceError::from_db)?
        .ok_or_else(|| ServiceError::NotFound(format!("Allocation {} not found", allocation_id)))
}
