//! Wire shapes of the transfer-request endpoints.

use crate::domain::{
    AcceptTransfer, ItemId, Party, TransferDetail, TransferId, TransferItem, TransferLine,
    TransferStatus, TransferSummary, UserId, WarehouseId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whose side of the transfer a list query is filtered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferParty {
    Sender(UserId),
    Recipient(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuery {
    pub party: TransferParty,
    /// Status filter exactly as the endpoint expects it.
    pub status: String,
    pub page_number: u32,
    pub page_size: u32,
}

impl TransferQuery {
    /// Pending transfers addressed to `recipient`.
    pub fn incoming(recipient: UserId, page_number: u32, page_size: u32) -> Self {
        Self {
            party: TransferParty::Recipient(recipient),
            status: "Pending".to_string(),
            page_number,
            page_size,
        }
    }

    /// Pending transfers sent by `sender`. This side of the backend expects
    /// the status in upper case.
    pub fn outgoing(sender: UserId, page_number: u32, page_size: u32) -> Self {
        Self {
            party: TransferParty::Sender(sender),
            status: "PENDING".to_string(),
            page_number,
            page_size,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let party = match &self.party {
            TransferParty::Sender(id) => ("senderId", id.to_string()),
            TransferParty::Recipient(id) => ("recipientId", id.to_string()),
        };
        vec![
            party,
            ("status", self.status.clone()),
            ("pageNumber", self.page_number.to_string()),
            ("pageSize", self.page_size.to_string()),
        ]
    }
}

/// List endpoints answer either with a bare array or a paged envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Bare(Vec<T>),
    Paged {
        #[serde(alias = "data", alias = "results")]
        items: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) | ListResponse::Paged { items } => items,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemDto {
    pub item_id: String,
    #[serde(default, alias = "itemName")]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

impl From<TransferItemDto> for TransferItem {
    fn from(dto: TransferItemDto) -> Self {
        TransferItem {
            name: dto.name.unwrap_or_else(|| dto.item_id.clone()),
            item_id: ItemId::new(dto.item_id),
            sku: dto.sku,
            description: dto.description,
            quantity: dto.quantity,
            image_url: dto.image_url,
            warehouse_id: dto.warehouse_id.map(WarehouseId::new),
        }
    }
}

/// Transfer as returned by both the list and the detail endpoints; the list
/// endpoint leaves `items` out and only reports `itemCount`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDto {
    #[serde(alias = "requestNumber")]
    pub id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub recipient_id: String,
    #[serde(default)]
    pub recipient_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub item_count: Option<u32>,
    #[serde(default)]
    pub items: Option<Vec<TransferItemDto>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransferDto {
    pub fn into_summary(self) -> TransferSummary {
        self.split().0
    }

    pub fn into_detail(self) -> TransferDetail {
        let (summary, items, image_url, warehouse_id) = self.split();
        TransferDetail {
            summary,
            items,
            image_url,
            warehouse_id,
        }
    }

    fn split(
        self,
    ) -> (
        TransferSummary,
        Vec<TransferItem>,
        Option<String>,
        Option<WarehouseId>,
    ) {
        let items: Vec<TransferItem> = self
            .items
            .unwrap_or_default()
            .into_iter()
            .map(TransferItem::from)
            .collect();
        let item_count = self
            .item_count
            .unwrap_or_else(|| u32::try_from(items.len()).unwrap_or(u32::MAX));
        let summary = TransferSummary {
            id: TransferId::new(self.id),
            sender: Party {
                id: UserId::new(self.sender_id),
                name: self.sender_name,
            },
            recipient: Party {
                id: UserId::new(self.recipient_id),
                name: self.recipient_name,
            },
            status: TransferStatus::from_backend(&self.status),
            item_count,
            notes: self.notes,
            created_at: self.created_at,
            rejection_reason: self.rejection_reason,
        };
        (
            summary,
            items,
            self.image_url,
            self.warehouse_id.map(WarehouseId::new),
        )
    }
}

/// Body of `POST /transfer-requests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub warehouse_id: WarehouseId,
    pub project_id: Option<String>,
    pub image_url: String,
    pub notes: Option<String>,
    pub items: Vec<TransferLine>,
}

/// Body of `PUT /transfer-requests/{id}/accept`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptTransferRequest {
    pub company_id: String,
    pub customer_id: String,
    pub department_id: Option<String>,
    pub project_id: String,
    pub work_order_id: Option<String>,
    pub notes: Option<String>,
}

impl From<&AcceptTransfer> for AcceptTransferRequest {
    fn from(accept: &AcceptTransfer) -> Self {
        let chain = &accept.chain;
        Self {
            company_id: chain.company.id.clone(),
            customer_id: chain.customer.id.clone(),
            department_id: chain.department_id().map(str::to_string),
            project_id: chain.project.id.clone(),
            work_order_id: chain.work_order_id().map(str::to_string),
            notes: accept.notes.clone(),
        }
    }
}

/// Optional body of `DELETE /transfer-requests/{id}` when the recipient rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectTransferBody {
    pub recipient_id: UserId,
    pub reason: String,
}
