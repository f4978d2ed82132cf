use crate::entities::{Requester, TaskDirection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// In-process domain events. Consumers only observe; nothing here feeds back
/// into stock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    WithdrawalAllocated {
        material_id: i64,
        requester: Requester,
        quantity: i32,
        task_ids: Vec<i64>,
    },
    PutAwayRequested {
        task_id: i64,
        material_id: i64,
        quantity: i32,
    },
    TaskCompleted {
        task_id: i64,
        material_id: i64,
        direction: TaskDirection,
        quantity: i32,
    },
    TaskReadyForPickup {
        task_id: i64,
        order_line_ref: String,
    },
    MaterialPurged {
        material_id: i64,
    },
    LowStock {
        material_id: i64,
        on_hand: i64,
        minimum: i32,
    },
    DeliveryReceived {
        material_id: i64,
        accepted: i32,
        quarantined: i32,
        disputed: i32,
    },
    DeliveryPutAway {
        delivery_id: i64,
        lot_id: i64,
        quantity: i32,
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

    /// Sends an event, logging instead of failing when nobody listens.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "domain event dropped");
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::LowStock {
                material_id,
                on_hand,
                minimum,
            } => {
                warn!(material_id, on_hand, minimum, "stock below minimum");
            }
            Event::MaterialPurged { material_id } => {
                info!(material_id, "custom material removed from catalog");
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}
