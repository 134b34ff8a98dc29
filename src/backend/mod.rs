//! Bindings to the inventory backend.
//!
//! [`InventoryApi`] is the seam every service talks through; [`HttpInventoryApi`]
//! is the bearer-token REST implementation.

pub mod dto;
pub mod http;

pub use dto::{AcceptTransferRequest, CreateTransferRequest, TransferParty, TransferQuery};
pub use http::HttpInventoryApi;

use crate::{
    domain::{
        BorrowRequestPayload, BorrowRequestReceipt, CatalogItem, Company, Customer,
        HierarchyScope, Project, TransferDetail, TransferId, TransferSummary, UserId,
        WarehouseId, WorkOrder,
    },
    errors::ServiceError,
};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError>;

    async fn list_customers(&self, scope: &HierarchyScope) -> Result<Vec<Customer>, ServiceError>;

    async fn list_projects(&self, scope: &HierarchyScope) -> Result<Vec<Project>, ServiceError>;

    async fn list_work_orders(&self, scope: &HierarchyScope)
        -> Result<Vec<WorkOrder>, ServiceError>;

    /// Catalog snapshot of one warehouse.
    async fn list_catalog(&self, warehouse_id: &WarehouseId)
        -> Result<Vec<CatalogItem>, ServiceError>;

    /// One page of transfer summaries (no item payloads).
    async fn list_transfers(&self, query: &TransferQuery)
        -> Result<Vec<TransferSummary>, ServiceError>;

    async fn get_transfer(&self, id: &TransferId) -> Result<TransferDetail, ServiceError>;

    async fn create_transfer(
        &self,
        request: &CreateTransferRequest,
    ) -> Result<TransferSummary, ServiceError>;

    async fn accept_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        request: &AcceptTransferRequest,
    ) -> Result<(), ServiceError>;

    /// Recipient declines a pending transfer, giving a reason.
    async fn reject_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        reason: &str,
    ) -> Result<(), ServiceError>;

    /// Sender withdraws a pending transfer.
    async fn cancel_transfer(&self, id: &TransferId, sender_id: &UserId)
        -> Result<(), ServiceError>;

    async fn create_borrow_request(
        &self,
        payload: &BorrowRequestPayload,
    ) -> Result<BorrowRequestReceipt, ServiceError>;
}
