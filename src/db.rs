use crate::config::AppConfig;
use crate::entities::stock_batch::{self, Entity as StockBatch};
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use anyhow::Context;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QuerySelect, Statement,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let db_pool = Database::connect(opt).await.map_err(ServiceError::from_db)?;

    info!(
        max_connections = config.max_connections,
        "Database connection pool established"
    );

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Convenience helper: load configuration from the environment and connect.
pub async fn create_db_pool() -> anyhow::Result<DbPool> {
    let cfg = crate::config::load_config().context("failed to load configuration")?;
    establish_connection_from_app_config(&cfg)
        .await
        .context("failed to establish database connection")
}

/// Applies all pending schema migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), ServiceError> {
    Migrator::up(db, None).await.map_err(ServiceError::from_db)?;
    info!("Database migrations applied");
    Ok(())
}

/// Bound on how long a transaction waits for a competing holder of the batch
/// row before the backend gives up and the caller sees `Contention`.
const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pins a batch's aggregate state for the duration of a read-decide-write
/// sequence.
///
/// On Postgres this takes a row-level exclusive lock (`SELECT ... FOR
/// UPDATE`) with a bounded wait, so competing approvals/allocations on the
/// same batch serialize while operations on different batches proceed in
/// parallel. SQLite has no row locks; its single-writer transaction semantics
/// provide the same serialization, with busy errors surfacing as retryable
/// `Contention`.
pub(crate) async fn lock_batch(
    txn: &DatabaseTransaction,
    batch_id: Uuid,
) -> Result<stock_batch::Model, ServiceError> {
    let mut query = StockBatch::find_by_id(batch_id);
    if txn.get_database_backend() == DbBackend::Postgres {
        txn.execute(Statement::from_string(
            DbBackend::Postgres,
            format!(
                "SET LOCAL lock_timeout = '{}ms'",
                LOCK_WAIT_TIMEOUT.as_millis()
            ),
        ))
        .await
        .map_err(ServiceError::from_db)?;
        query = query.lock_exclusive();
    }

    query
        .one(txn)
        .await
        .map_err(ServiceError::from_db)?
        .ok_or_else(|| ServiceError::NotFound(format!("Stock batch {} not found", batch_id)))
}
