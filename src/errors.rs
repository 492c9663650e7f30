use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Error type returned by every mutating ledger operation.
///
/// Business-rule rejections carry the numeric inputs that produced them so a
/// caller can present an actionable message without re-querying. Infrastructure
/// failures (`DatabaseError`, `Other`) are a distinct kind and are never
/// conflated with rule violations.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[serde(skip)] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(
        "Insufficient stock on batch {batch_id}: requested {requested_quantity} but only \
         {remaining} remains unallocated (recorded {recorded_quantity}, approved delta \
         {approved_delta}, available {available}, already allocated {already_allocated})"
    )]
    InsufficientStock {
        batch_id: Uuid,
        recorded_quantity: i64,
        approved_delta: i64,
        available: i64,
        already_allocated: i64,
        remaining: i64,
        requested_quantity: i64,
    },

    #[error(
        "Negative availability on batch {batch_id}: recorded {recorded_quantity} plus approved \
         delta {approved_delta} leaves {available}; recorded losses exceed recorded stock"
    )]
    NegativeAvailability {
        batch_id: Uuid,
        recorded_quantity: i64,
        approved_delta: i64,
        available: i64,
    },

    #[error(
        "Approving this loss would strand storefront commitments on batch {batch_id}: new \
         available {new_available} is below allocated {allocated} (recorded {recorded_quantity}, \
         other approved delta {other_delta}, delta {quantity_delta})"
    )]
    BelowAllocatedFloor {
        batch_id: Uuid,
        recorded_quantity: i64,
        allocated: i64,
        other_delta: i64,
        quantity_delta: i64,
        new_available: i64,
    },

    #[error(
        "Approving this loss would drive batch {batch_id} availability below zero: new available \
         {new_available} (recorded {recorded_quantity}, other approved delta {other_delta}, delta \
         {quantity_delta})"
    )]
    WouldGoNegative {
        batch_id: Uuid,
        recorded_quantity: i64,
        allocated: i64,
        other_delta: i64,
        quantity_delta: i64,
        new_available: i64,
    },

    #[error("Invalid status transition on adjustment {adjustment_id}: {from} -> {to}")]
    InvalidTransition {
        adjustment_id: Uuid,
        from: String,
        to: String,
    },

    #[error("Contention: {0}")]
    Contention(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a database error, normalizing lock and serialization conflicts
    /// into the retryable `Contention` variant.
    pub fn from_db(err: DbErr) -> Self {
        if is_lock_conflict(&err) {
            ServiceError::Contention(err.to_string())
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    /// Whether the caller may safely re-issue the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Contention(_))
    }

    /// Whether this is an infrastructure failure rather than a business-rule
    /// rejection.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) | ServiceError::Other(_)
        )
    }
}

/// Lock-wait timeouts, deadlocks, serialization failures and SQLite busy
/// states all mean the same thing to a caller: back off and retry.
fn is_lock_conflict(err: &DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("lock timeout")
        || msg.contains("could not obtain lock")
        || msg.contains("deadlock")
        || msg.contains("could not serialize access")
        || msg.contains("serialization failure")
}
