pub mod audit_log_entry;
pub mod stock_adjustment;
pub mod stock_allocation;
pub mod stock_batch;

pub use audit_log_entry::{AuditAction, Entity as AuditLogEntry};
pub use stock_adjustment::{AdjustmentStatus, AdjustmentType, Entity as StockAdjustment};
pub use stock_allocation::Entity as StockAllocation;
pub use stock_batch::Entity as StockBatch;
