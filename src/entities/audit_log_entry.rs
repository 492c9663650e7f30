use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record, immutable once written.
///
/// One entry is written per committed state transition, within the same
/// transaction as the transition itself. No update or delete surface exists.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    /// Batch whose aggregate state the transition touched.
    pub batch_id: Uuid,
    pub subject_table: String,
    pub subject_id: Uuid,
    pub action: String,
    pub old_value: Option<Json>,
    pub new_value: Option<Json>,
    pub actor_id: Uuid,
    pub metadata: Option<Json>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    AdjustmentApproved,
    AdjustmentCompleted,
    AdjustmentRejected,
    AllocationCreated,
    AllocationUpdated,
    AllocationReleased,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AdjustmentApproved => "ADJUSTMENT_APPROVED",
            AuditAction::AdjustmentCompleted => "ADJUSTMENT_COMPLETED",
            AuditAction::AdjustmentRejected => "ADJUSTMENT_REJECTED",
            AuditAction::AllocationCreated => "ALLOCATION_CREATED",
            AuditAction::AllocationUpdated => "ALLOCATION_UPDATED",
            AuditAction::AllocationReleased => "ALLOCATION_RELEASED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADJUSTMENT_APPROVED" => Some(AuditAction::AdjustmentApproved),
            "ADJUSTMENT_COMPLETED" => Some(AuditAction::AdjustmentCompleted),
            "ADJUSTMENT_REJECTED" => Some(AuditAction::AdjustmentRejected),
            "ALLOCATION_CREATED" => Some(AuditAction::AllocationCreated),
            "ALLOCATION_UPDATED" => Some(AuditAction::AllocationUpdated),
            "ALLOCATION_RELEASED" => Some(AuditAction::AllocationReleased),
            _ => None,
        }
    }
}
