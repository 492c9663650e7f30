use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use stock_ledger::config::AppConfig;
use stock_ledger::db::{self, DbPool};
use stock_ledger::entities::stock_adjustment::{self, AdjustmentStatus, AdjustmentType};
use stock_ledger::entities::stock_batch;
use stock_ledger::errors::ServiceError;
use stock_ledger::events;
use stock_ledger::services::batches::CreateBatchCommand;
use stock_ledger::StockLedger;
use uuid::Uuid;

/// Harness over the full service stack backed by in-memory SQLite.
///
/// The pool is pinned to a single connection so concurrent service calls
/// serialize on pool acquisition, making races deterministic under SQLite.
pub struct TestLedger {
    pub ledger: StockLedger,
    #[allow(dead_code)]
    pub pool: Arc<DbPool>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestLedger {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let pool = Arc::new(pool);
        let (sender, receiver) = events::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(receiver));

        Self {
            ledger: StockLedger::new(pool.clone(), sender),
            pool,
            _event_task: event_task,
        }
    }

    /// Receives a batch with the given quantity.
    pub async fn seed_batch(&self, recorded_quantity: i64) -> stock_batch::Model {
        self.ledger
            .batches
            .create_batch(CreateBatchCommand {
                product_id: Uuid::new_v4(),
                warehouse_id: Uuid::new_v4(),
                supplier_id: None,
                recorded_quantity,
                unit_cost: None,
                total_cost: None,
                received_at: None,
            })
            .await
            .expect("seed batch")
    }

    /// Inserts an adjustment row directly, bypassing the approval workflow.
    /// Used to stage states (like an already-negative availability) that the
    /// services themselves refuse to create.
    #[allow(dead_code)]
    pub async fn insert_raw_adjustment(
        &self,
        batch_id: Uuid,
        quantity_delta: i64,
        status: AdjustmentStatus,
    ) -> stock_adjustment::Model {
        let now = Utc::now();
        stock_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_batch_id: Set(batch_id),
            quantity_delta: Set(quantity_delta),
            adjustment_type: Set(AdjustmentType::Recount.as_str().to_string()),
            status: Set(status.as_str().to_string()),
            reason: Set("test fixture".to_string()),
            requested_by: Set(Uuid::new_v4()),
            approved_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.pool.as_ref())
        .await
        .expect("insert raw adjustment")
    }
}

/// Retries an operation while it reports retryable contention.
#[allow(dead_code)]
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempts < 10 => {
                attempts += 1;
                tokio::time::sleep(std::time::Duration::from_millis(10 * attempts)).await;
            }
            other => return other,
        }
    }
}
