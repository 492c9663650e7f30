use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A proposed or finalized signed quantity delta against one batch.
///
/// Negative deltas are losses (shrinkage), positive deltas are gains. Only
/// APPROVED or COMPLETED adjustments contribute to available-quantity
/// arithmetic; PENDING and REJECTED contribute zero.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub stock_batch_id: Uuid,
    pub quantity_delta: i64,
    pub adjustment_type: String,
    pub status: String,
    pub reason: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Parses the stored status, `None` for unrecognized values.
    pub fn adjustment_status(&self) -> Option<AdjustmentStatus> {
        AdjustmentStatus::from_str(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_batch::Entity",
        from = "Column::StockBatchId",
        to = "super::stock_batch::Column::Id"
    )]
    StockBatch,
}

impl Related<super::stock_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBatch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Closed adjustment status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl AdjustmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentStatus::Pending => "PENDING",
            AdjustmentStatus::Approved => "APPROVED",
            AdjustmentStatus::Completed => "COMPLETED",
            AdjustmentStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AdjustmentStatus::Pending),
            "APPROVED" => Some(AdjustmentStatus::Approved),
            "COMPLETED" => Some(AdjustmentStatus::Completed),
            "REJECTED" => Some(AdjustmentStatus::Rejected),
            _ => None,
        }
    }

    /// Only approved and completed adjustments enter availability arithmetic.
    pub fn counts_toward_available(&self) -> bool {
        matches!(self, AdjustmentStatus::Approved | AdjustmentStatus::Completed)
    }

    /// Terminal states are immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdjustmentStatus::Pending)
    }

    /// The complete transition table: PENDING may move to any of the three
    /// finalized states; finalized states never move again.
    pub fn can_transition_to(&self, target: AdjustmentStatus) -> bool {
        match (self, target) {
            (AdjustmentStatus::Pending, AdjustmentStatus::Approved)
            | (AdjustmentStatus::Pending, AdjustmentStatus::Completed)
            | (AdjustmentStatus::Pending, AdjustmentStatus::Rejected) => true,
            (AdjustmentStatus::Pending, AdjustmentStatus::Pending)
            | (AdjustmentStatus::Approved, _)
            | (AdjustmentStatus::Completed, _)
            | (AdjustmentStatus::Rejected, _) => false,
        }
    }
}

/// Enumerated reason codes for adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentType {
    Damage,
    Theft,
    Expiry,
    Spoilage,
    Recount,
    FoundStock,
    Other,
}

impl AdjustmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Damage => "DAMAGE",
            AdjustmentType::Theft => "THEFT",
            AdjustmentType::Expiry => "EXPIRY",
            AdjustmentType::Spoilage => "SPOILAGE",
            AdjustmentType::Recount => "RECOUNT",
            AdjustmentType::FoundStock => "FOUND_STOCK",
            AdjustmentType::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DAMAGE" => Some(AdjustmentType::Damage),
            "THEFT" => Some(AdjustmentType::Theft),
            "EXPIRY" => Some(AdjustmentType::Expiry),
            "SPOILAGE" => Some(AdjustmentType::Spoilage),
            "RECOUNT" => Some(AdjustmentType::Recount),
            "FOUND_STOCK" => Some(AdjustmentType::FoundStock),
            "OTHER" => Some(AdjustmentType::Other),
            _ => None,
        }
    }

    /// Loss reason codes (the shrinkage class).
    pub fn is_shrinkage(&self) -> bool {
        matches!(
            self,
            AdjustmentType::Damage
                | AdjustmentType::Theft
                | AdjustmentType::Expiry
                | AdjustmentType::Spoilage
        )
    }
}
