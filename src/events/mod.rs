use crate::domain::{ItemId, TransferId, WarehouseId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender plus its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }

    /// Non-blocking variant for synchronous call sites.
    pub fn emit(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Failed to emit event: {}", e);
        }
    }
}

// Define the various events that can occur in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemRemoved(ItemId),

    // Session events
    ConnectivityChanged {
        offline: bool,
    },

    // Draft events
    DraftItemSelected {
        item_id: ItemId,
        quantity: u32,
    },
    DraftItemsReset {
        warehouse_id: WarehouseId,
        discarded: usize,
        warned: bool,
    },
    BorrowRequestSubmitted {
        request_id: String,
        item_count: usize,
    },

    // Transfer events
    TransferCreated(TransferId),
    TransferAccepted(TransferId),
    TransferRejected {
        transfer_id: TransferId,
        reason: String,
    },
    TransferCancelled(TransferId),
    TransferQueueRefreshed {
        pending: usize,
    },
}

impl Event {
    /// Text for user-facing notifications; `None` for background events.
    pub fn notification(&self) -> Option<String> {
        match self {
            Event::DraftItemsReset {
                warned: true,
                warehouse_id,
                ..
            } => Some(format!(
                "Item list was reset because the warehouse changed to {}",
                warehouse_id
            )),
            Event::BorrowRequestSubmitted { item_count, .. } => Some(format!(
                "Borrow request submitted with {} item(s)",
                item_count
            )),
            Event::TransferCreated(id) => Some(format!("Transfer {} sent", id)),
            Event::TransferAccepted(id) => Some(format!("Transfer {} accepted", id)),
            Event::TransferRejected { transfer_id, .. } => {
                Some(format!("Transfer {} rejected", transfer_id))
            }
            Event::TransferCancelled(id) => Some(format!("Transfer {} cancelled", id)),
            Event::ConnectivityChanged { offline: true } => {
                Some("You are offline; changes cannot be sent until the connection returns".into())
            }
            Event::ConnectivityChanged { offline: false } => Some("Back online".into()),
            _ => None,
        }
    }
}

/// Drains the event channel, logging every event and its notification text.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event.notification() {
            Some(text) => info!(event = ?event, "{}", text),
            None => info!("Received event: {:?}", event),
        }
    }

    error!("Event channel closed; stopping event processing");
}
