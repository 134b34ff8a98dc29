use super::{HierarchyChain, ItemId, TransferId, UserId, WarehouseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Lifecycle state of a transfer as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Completed,
    Rejected,
    /// A status string this client does not recognise. Never actionable.
    Unknown(String),
}

impl TransferStatus {
    /// Maps a backend status string. The backend is inconsistent about case
    /// (`Pending` vs `PENDING`), so matching ignores it.
    pub fn from_backend(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => TransferStatus::Pending,
            "completed" => TransferStatus::Completed,
            "rejected" => TransferStatus::Rejected,
            _ => {
                warn!(status = raw, "Unrecognised transfer status from backend");
                TransferStatus::Unknown(raw.to_string())
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TransferStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Rejected)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => f.write_str("Pending"),
            TransferStatus::Completed => f.write_str("Completed"),
            TransferStatus::Rejected => f.write_str("Rejected"),
            TransferStatus::Unknown(raw) => write!(f, "Unknown({})", raw),
        }
    }
}

/// Direction relative to the current user. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
}

impl Party {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// List-view representation: item counts only, no item payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub id: TransferId,
    pub sender: Party,
    pub recipient: Party,
    pub status: TransferStatus,
    pub item_count: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Reason given by the recipient when rejecting.
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl TransferSummary {
    pub fn direction_for(&self, current_user: &UserId) -> TransferDirection {
        direction(&self.sender.id, current_user)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
}

/// Full transfer including items and the evidentiary photo, fetched on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetail {
    pub summary: TransferSummary,
    pub items: Vec<TransferItem>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
}

impl TransferDetail {
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Item line of a transfer being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Recipient input for accepting a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptTransfer {
    pub chain: HierarchyChain,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn direction(sender: &UserId, current_user: &UserId) -> TransferDirection {
    if sender == current_user {
        TransferDirection::Outgoing
    } else {
        TransferDirection::Incoming
    }
}
