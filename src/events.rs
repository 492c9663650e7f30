//! Post-commit notifications for ledger state changes.
//!
//! Events are informational: they are emitted after the enclosing transaction
//! has committed, and a delivery failure never unwinds a committed change.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the ledger, one per committed state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchReceived {
        batch_id: Uuid,
        warehouse_id: Uuid,
        recorded_quantity: i64,
    },
    AdjustmentRequested {
        adjustment_id: Uuid,
        batch_id: Uuid,
        quantity_delta: i64,
    },
    AdjustmentApproved {
        adjustment_id: Uuid,
        batch_id: Uuid,
        quantity_delta: i64,
        new_available: i64,
    },
    AdjustmentCompleted {
        adjustment_id: Uuid,
        batch_id: Uuid,
        quantity_delta: i64,
        new_available: i64,
    },
    AdjustmentRejected {
        adjustment_id: Uuid,
        batch_id: Uuid,
    },
    StockAllocated {
        allocation_id: Uuid,
        batch_id: Uuid,
        storefront_id: Uuid,
        quantity: i64,
        remaining: i64,
    },
    AllocationUpdated {
        allocation_id: Uuid,
        batch_id: Uuid,
        old_quantity: i64,
        new_quantity: i64,
    },
    AllocationReleased {
        allocation_id: Uuid,
        batch_id: Uuid,
        quantity: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Post-commit notification. The state change has already landed, so a
    /// full channel or closed receiver is logged rather than propagated.
    pub async fn notify(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(?event, error = %e, "Dropped post-commit event");
        }
    }
}

/// Creates an event channel with the given capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Spawn this alongside the
/// services; replace with a real consumer to fan events out.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "Event processed");
    }
}
