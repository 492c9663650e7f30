pub mod adjustments;
pub mod allocations;
pub mod audit;
pub mod availability;
pub mod batches;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{
    stock_adjustment::{self, AdjustmentStatus, Entity as StockAdjustment},
    stock_allocation::{self, Entity as StockAllocation},
    stock_batch,
};
use crate::errors::ServiceError;
use availability::BatchAvailability;

/// Loads a batch's full availability snapshot on the caller's transaction.
///
/// `exclude_allocation` leaves one allocation out of the committed total when
/// an update replaces its quantity rather than adding to it.
pub(crate) async fn load_availability<C: ConnectionTrait>(
    conn: &C,
    batch: &stock_batch::Model,
    exclude_allocation: Option<Uuid>,
) -> Result<BatchAvailability, ServiceError> {
    let deltas = approved_deltas(conn, batch.id, None).await?;

    let mut query =
        StockAllocation::find().filter(stock_allocation::Column::StockBatchId.eq(batch.id));
    if let Some(allocation_id) = exclude_allocation {
        query = query.filter(stock_allocation::Column::Id.ne(allocation_id));
    }
    let allocations = query.all(conn).await.map_err(ServiceError::from_db)?;
    let quantities: Vec<i64> = allocations.iter().map(|a| a.quantity).collect();

    Ok(BatchAvailability::compute(
        batch.id,
        batch.recorded_quantity,
        &deltas,
        &quantities,
    ))
}

/// Deltas of APPROVED/COMPLETED adjustments for a batch, optionally excluding
/// the adjustment currently being decided.
pub(crate) async fn approved_deltas<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
    exclude_adjustment: Option<Uuid>,
) -> Result<Vec<i64>, ServiceError> {
    let mut query = StockAdjustment::find()
        .filter(stock_adjustment::Column::StockBatchId.eq(batch_id))
        .filter(stock_adjustment::Column::Status.is_in([
            AdjustmentStatus::Approved.as_str(),
            AdjustmentStatus::Completed.as_str(),
        ]));
    if let Some(adjustment_id) = exclude_adjustment {
        query = query.filter(stock_adjustment::Column::Id.ne(adjustment_id));
    }

    let adjustments = query.all(conn).await.map_err(ServiceError::from_db)?;
    Ok(adjustments.iter().map(|a| a.quantity_delta).collect())
}

/// Total quantity of a batch committed to storefronts.
pub(crate) async fn allocated_total<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
) -> Result<i64, ServiceError> {
    let allocations = StockAllocation::find()
        .filter(stock_allocation::Column::StockBatchId.eq(batch_id))
        .all(conn)
        .await
        .map_err(ServiceError::from_db)?;

    Ok(allocations.iter().map(|a| a.quantity).sum())
}
