//! Stock Ledger
//!
//! A transactional inventory ledger built around three facts and one derived
//! figure. Stock batches record what physically arrived and never change.
//! Signed adjustments correct the record through an approval workflow.
//! Allocations commit portions of a batch to storefronts. Availability is
//! recomputed from those three tables on every decision, inside the deciding
//! transaction, so it can never go negative and a batch can never be
//! over-allocated. Every transition lands in an append-only audit log in the
//! same transaction that caused it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use db::DbPool;
use events::EventSender;
use services::adjustments::AdjustmentService;
use services::allocations::AllocationService;
use services::audit::AuditService;
use services::batches::StockBatchService;

/// One handle bundling every ledger service over a shared pool.
#[derive(Clone)]
pub struct StockLedger {
    pub batches: StockBatchService,
    pub adjustments: AdjustmentService,
    pub allocations: AllocationService,
    pub audit: AuditService,
}

impl StockLedger {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            batches: StockBatchService::new(db_pool.clone(), event_sender.clone()),
            adjustments: AdjustmentService::new(db_pool.clone(), event_sender.clone()),
            allocations: AllocationService::new(db_pool.clone(), event_sender),
            audit: AuditService::new(db_pool),
        }
    }
}
