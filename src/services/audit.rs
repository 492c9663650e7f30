//! Audit Recorder: write-once, read-many log of every state transition.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::audit_log_entry::{self, AuditAction, Entity as AuditLogEntry};
use crate::errors::ServiceError;

/// Subject table name for adjustment transitions.
pub const SUBJECT_ADJUSTMENTS: &str = "stock_adjustments";
/// Subject table name for allocation mutations.
pub const SUBJECT_ALLOCATIONS: &str = "stock_allocations";

const MAX_TRAIL_PAGE: u64 = 1000;

/// A not-yet-persisted audit entry.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub batch_id: Uuid,
    pub subject_table: &'static str,
    pub subject_id: Uuid,
    pub action: AuditAction,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub actor_id: Uuid,
    pub metadata: Option<serde_json::Value>,
}

/// Read side of the audit log. Writing goes through [`AuditService::record`],
/// which runs on the caller's transaction so a transition and its entry
/// commit or roll back together.
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Appends one entry on the caller's connection or transaction.
    ///
    /// Storage failure here is fatal to the enclosing operation: the caller's
    /// transaction rolls back and neither the transition nor the entry lands.
    pub async fn record<C: ConnectionTrait>(
        conn: &C,
        entry: NewAuditEntry,
    ) -> Result<audit_log_entry::Model, ServiceError> {
        audit_log_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(entry.batch_id),
            subject_table: Set(entry.subject_table.to_string()),
            subject_id: Set(entry.subject_id),
            action: Set(entry.action.as_str().to_string()),
            old_value: Set(entry.old_value),
            new_value: Set(entry.new_value),
            actor_id: Set(entry.actor_id),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::from_db)
    }

    /// The audit trail for a batch, newest first.
    ///
    /// Paged by timestamp: pass the `created_at` of the last entry seen as
    /// `before` to restart the scan from there.
    #[instrument(skip(self))]
    pub async fn get_audit_trail(
        &self,
        batch_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<audit_log_entry::Model>, ServiceError> {
        self.trail(
            sea_orm::Condition::all().add(audit_log_entry::Column::BatchId.eq(batch_id)),
            before,
            limit,
        )
        .await
    }

    /// The audit trail for one subject row, newest first.
    #[instrument(skip(self))]
    pub async fn get_subject_trail(
        &self,
        subject_table: &str,
        subject_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<audit_log_entry::Model>, ServiceError> {
        self.trail(
            sea_orm::Condition::all()
                .add(audit_log_entry::Column::SubjectTable.eq(subject_table))
                .add(audit_log_entry::Column::SubjectId.eq(subject_id)),
            before,
            limit,
        )
        .await
    }

    async fn trail(
        &self,
        filter: sea_orm::Condition,
        before: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<audit_log_entry::Model>, ServiceError> {
        if limit == 0 || limit > MAX_TRAIL_PAGE {
            return Err(ServiceError::ValidationError(format!(
                "Limit must be between 1 and {}",
                MAX_TRAIL_PAGE
            )));
        }

        let mut query = AuditLogEntry::find().filter(filter);
        if let Some(before) = before {
            query = query.filter(audit_log_entry::Column::CreatedAt.lt(before));
        }

        query
            .order_by_desc(audit_log_entry::Column::CreatedAt)
            .limit(limit)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::from_db)
    }
}
