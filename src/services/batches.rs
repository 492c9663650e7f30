//! Stock Batch Store: immutable-quantity batches and derived availability.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::stock_batch::{self, Entity as StockBatch};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::availability::BatchAvailability;

/// Input contract for stock receiving (an external collaborator).
#[derive(Debug, Clone, Validate)]
pub struct CreateBatchCommand {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub supplier_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub recorded_quantity: i64,
    pub unit_cost: Option<rust_decimal::Decimal>,
    pub total_cost: Option<rust_decimal::Decimal>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Service owning stock batch rows. `recorded_quantity` is written exactly
/// once, here; no other service mutates a batch.
#[derive(Clone)]
pub struct StockBatchService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl StockBatchService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a warehouse receipt.
    #[instrument(skip(self))]
    pub async fn create_batch(
        &self,
        command: CreateBatchCommand,
    ) -> Result<stock_batch::Model, ServiceError> {
        command.validate()?;

        let now = Utc::now();
        let batch = stock_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(command.product_id),
            warehouse_id: Set(command.warehouse_id),
            supplier_id: Set(command.supplier_id),
            recorded_quantity: Set(command.recorded_quantity),
            unit_cost: Set(command.unit_cost),
            total_cost: Set(command.total_cost),
            received_at: Set(command.received_at.unwrap_or(now)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::from_db)?;

        info!(
            batch_id = %batch.id,
            product_id = %batch.product_id,
            warehouse_id = %batch.warehouse_id,
            recorded_quantity = batch.recorded_quantity,
            "Stock batch received"
        );

        self.event_sender
            .notify(Event::BatchReceived {
                batch_id: batch.id,
                warehouse_id: batch.warehouse_id,
                recorded_quantity: batch.recorded_quantity,
            })
            .await;

        Ok(batch)
    }

    /// Fetches one batch.
    #[instrument(skip(self))]
    pub async fn get_batch(&self, batch_id: Uuid) -> Result<stock_batch::Model, ServiceError> {
        StockBatch::find_by_id(batch_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock batch {} not found", batch_id)))
    }

    /// Lists batches with pagination.
    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_batch::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let paginator = StockBatch::find().paginate(self.db_pool.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::from_db)?;
        let batches = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::from_db)?;

        Ok((batches, total))
    }

    /// Computes the full availability snapshot for a batch.
    ///
    /// Derived figures are never persisted; this recomputes them from the
    /// batch, its adjustments and its allocations inside one transaction so
    /// the three reads are mutually consistent.
    #[instrument(skip(self))]
    pub async fn get_availability(
        &self,
        batch_id: Uuid,
    ) -> Result<BatchAvailability, ServiceError> {
        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::from_db)?;

        let batch = StockBatch::find_by_id(batch_id)
            .one(&txn)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock batch {} not found", batch_id)))?;

        let availability = super::load_availability(&txn, &batch, None).await?;
        txn.commit().await.map_err(ServiceError::from_db)?;

        Ok(availability)
    }

    /// The true sellable/allocatable amount for a batch.
    pub async fn get_available_quantity(&self, batch_id: Uuid) -> Result<i64, ServiceError> {
        Ok(self.get_availability(batch_id).await?.available)
    }
}
