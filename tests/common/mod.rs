#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use stockroom::backend::{
    AcceptTransferRequest, CreateTransferRequest, InventoryApi, TransferParty, TransferQuery,
};
use stockroom::domain::{
    BorrowRequestPayload, BorrowRequestReceipt, CatalogItem, Company, Customer, HierarchyScope,
    ItemId, Party, Project, TransferDetail, TransferId, TransferItem, TransferStatus,
    TransferSummary, UserId, WarehouseId, WorkOrder,
};
use stockroom::errors::ServiceError;
use stockroom::session::SessionUser;
use stockroom::{AppConfig, ServiceFactory};

pub const SENDER: &str = "u-1";
pub const RECIPIENT: &str = "u-2";

/// In-memory backend that behaves like the real transfer endpoints: accept,
/// reject and cancel only work on Pending transfers for the right party.
#[derive(Default)]
pub struct FakeInventoryApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    companies: Vec<Company>,
    customers: Vec<Customer>,
    projects: Vec<Project>,
    work_orders: Vec<WorkOrder>,
    catalogs: HashMap<WarehouseId, Vec<CatalogItem>>,
    transfers: Vec<TransferDetail>,
    failures: HashMap<&'static str, fn() -> ServiceError>,
    calls: HashMap<&'static str, usize>,
    accepted: Vec<(TransferId, AcceptTransferRequest)>,
    borrow_requests: Vec<BorrowRequestPayload>,
    next_id: u32,
}

impl FakeInventoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with one company → customer → project → work order chain and
    /// three warehouses.
    pub fn seeded() -> Self {
        let api = Self::new();
        {
            let mut state = api.state();
            state.companies = vec![
                Company {
                    id: "c-1".into(),
                    name: "Acme".into(),
                },
                Company {
                    id: "c-2".into(),
                    name: "Globex".into(),
                },
            ];
            state.customers = vec![customer("cu-1", "c-1"), customer("cu-2", "c-2")];
            state.projects = vec![Project {
                id: "p-1".into(),
                name: "Bridge".into(),
                code: Some("BR".into()),
                customer_id: "cu-1".into(),
                department_id: Some("d-1".into()),
            }];
            state.work_orders = vec![WorkOrder {
                id: "wo-1".into(),
                code: "WO-1".into(),
                service_description: Some("Inspection".into()),
                start_date: None,
                end_date: None,
                project_id: "p-1".into(),
            }];
            state.catalogs.insert(
                WarehouseId::from("W1"),
                vec![
                    catalog_item("drill", "Drill", "W1", 10),
                    catalog_item("saw", "Saw", "W1", 3),
                    catalog_item("tape", "Tape", "W1", 0),
                ],
            );
            state.catalogs.insert(
                WarehouseId::from("W2"),
                vec![catalog_item("ladder", "Ladder", "W2", 5)],
            );
            state.catalogs.insert(
                WarehouseId::from("W3"),
                vec![catalog_item("cable", "Cable", "W3", 50)],
            );
            state.next_id = 500;
        }
        api
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Counts the call and returns an injected failure, if any.
    fn enter(&self, op: &'static str) -> Result<(), ServiceError> {
        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.remove(op) {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    /// The next call to `op` fails with `make()`.
    pub fn fail_next(&self, op: &'static str, make: fn() -> ServiceError) {
        self.state().failures.insert(op, make);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    pub fn insert_transfer(&self, detail: TransferDetail) {
        self.state().transfers.push(detail);
    }

    pub fn transfer(&self, id: &str) -> Option<TransferDetail> {
        self.state()
            .transfers
            .iter()
            .find(|t| t.summary.id.as_str() == id)
            .cloned()
    }

    pub fn accepted(&self) -> Vec<(TransferId, AcceptTransferRequest)> {
        self.state().accepted.clone()
    }

    pub fn borrow_requests(&self) -> Vec<BorrowRequestPayload> {
        self.state().borrow_requests.clone()
    }

    pub fn set_catalog(&self, warehouse: &str, items: Vec<CatalogItem>) {
        self.state().catalogs.insert(WarehouseId::from(warehouse), items);
    }

    fn pending_for_update(
        state: &mut FakeState,
        id: &TransferId,
    ) -> Result<usize, ServiceError> {
        let index = state
            .transfers
            .iter()
            .position(|t| &t.summary.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {}", id)))?;
        if !state.transfers[index].summary.status.is_pending() {
            return Err(ServiceError::from_status(409, "Transfer is not pending"));
        }
        Ok(index)
    }
}

#[async_trait]
impl InventoryApi for FakeInventoryApi {
    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError> {
        self.enter("list_companies")?;
        Ok(self.state().companies.clone())
    }

    async fn list_customers(&self, scope: &HierarchyScope) -> Result<Vec<Customer>, ServiceError> {
        self.enter("list_customers")?;
        Ok(self
            .state()
            .customers
            .iter()
            .filter(|c| scope.company_id.as_deref() == Some(c.company_id.as_str()))
            .cloned()
            .collect())
    }

    async fn list_projects(&self, scope: &HierarchyScope) -> Result<Vec<Project>, ServiceError> {
        self.enter("list_projects")?;
        Ok(self
            .state()
            .projects
            .iter()
            .filter(|p| scope.customer_id.as_deref() == Some(p.customer_id.as_str()))
            .cloned()
            .collect())
    }

    async fn list_work_orders(
        &self,
        scope: &HierarchyScope,
    ) -> Result<Vec<WorkOrder>, ServiceError> {
        self.enter("list_work_orders")?;
        Ok(self
            .state()
            .work_orders
            .iter()
            .filter(|w| scope.project_id.as_deref() == Some(w.project_id.as_str()))
            .cloned()
            .collect())
    }

    async fn list_catalog(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<CatalogItem>, ServiceError> {
        self.enter("list_catalog")?;
        Ok(self
            .state()
            .catalogs
            .get(warehouse_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_transfers(
        &self,
        query: &TransferQuery,
    ) -> Result<Vec<TransferSummary>, ServiceError> {
        self.enter("list_transfers")?;
        let state = self.state();
        let wanted = TransferStatus::from_backend(&query.status);
        let matching: Vec<TransferSummary> = state
            .transfers
            .iter()
            .map(|t| &t.summary)
            .filter(|s| match &query.party {
                TransferParty::Sender(id) => &s.sender.id == id,
                TransferParty::Recipient(id) => &s.recipient.id == id,
            })
            .filter(|s| s.status == wanted)
            .cloned()
            .collect();
        let size = query.page_size as usize;
        let skip = (query.page_number.saturating_sub(1) as usize) * size;
        Ok(matching.into_iter().skip(skip).take(size).collect())
    }

    async fn get_transfer(&self, id: &TransferId) -> Result<TransferDetail, ServiceError> {
        self.enter("get_transfer")?;
        self.state()
            .transfers
            .iter()
            .find(|t| &t.summary.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {}", id)))
    }

    async fn create_transfer(
        &self,
        request: &CreateTransferRequest,
    ) -> Result<TransferSummary, ServiceError> {
        self.enter("create_transfer")?;
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("TR-{}", state.next_id);
        let items: Vec<TransferItem> = request
            .items
            .iter()
            .map(|line| TransferItem {
                item_id: line.item_id.clone(),
                name: line.item_id.to_string(),
                sku: None,
                description: None,
                quantity: line.quantity,
                image_url: None,
                warehouse_id: Some(request.warehouse_id.clone()),
            })
            .collect();
        let mut detail = transfer(
            &id,
            request.sender_id.as_str(),
            request.recipient_id.as_str(),
            TransferStatus::Pending,
            Utc::now(),
        );
        detail.summary.item_count = items.len() as u32;
        detail.summary.notes = request.notes.clone();
        detail.items = items;
        detail.image_url = Some(request.image_url.clone());
        detail.warehouse_id = Some(request.warehouse_id.clone());
        let summary = detail.summary.clone();
        state.transfers.push(detail);
        Ok(summary)
    }

    async fn accept_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        request: &AcceptTransferRequest,
    ) -> Result<(), ServiceError> {
        self.enter("accept_transfer")?;
        let mut state = self.state();
        let index = Self::pending_for_update(&mut state, id)?;
        if &state.transfers[index].summary.recipient.id != recipient_id {
            return Err(ServiceError::from_status(403, "Not the recipient"));
        }
        state.transfers[index].summary.status = TransferStatus::Completed;
        state.accepted.push((id.clone(), request.clone()));
        Ok(())
    }

    async fn reject_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        reason: &str,
    ) -> Result<(), ServiceError> {
        self.enter("reject_transfer")?;
        let mut state = self.state();
        let index = Self::pending_for_update(&mut state, id)?;
        if &state.transfers[index].summary.recipient.id != recipient_id {
            return Err(ServiceError::from_status(403, "Not the recipient"));
        }
        let summary = &mut state.transfers[index].summary;
        summary.status = TransferStatus::Rejected;
        summary.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    async fn cancel_transfer(
        &self,
        id: &TransferId,
        sender_id: &UserId,
    ) -> Result<(), ServiceError> {
        self.enter("cancel_transfer")?;
        let mut state = self.state();
        let index = Self::pending_for_update(&mut state, id)?;
        if &state.transfers[index].summary.sender.id != sender_id {
            return Err(ServiceError::from_status(403, "Not the sender"));
        }
        state.transfers.remove(index);
        Ok(())
    }

    async fn create_borrow_request(
        &self,
        payload: &BorrowRequestPayload,
    ) -> Result<BorrowRequestReceipt, ServiceError> {
        self.enter("create_borrow_request")?;
        let mut state = self.state();
        state.next_id += 1;
        let receipt = BorrowRequestReceipt {
            id: format!("br-{}", state.next_id),
            request_number: Some(format!("BR-{}", state.next_id)),
        };
        state.borrow_requests.push(payload.clone());
        Ok(receipt)
    }
}

pub fn customer(id: &str, company_id: &str) -> Customer {
    Customer {
        id: id.into(),
        name: format!("Customer {}", id),
        code: None,
        company_id: company_id.into(),
    }
}

pub fn catalog_item(id: &str, name: &str, warehouse: &str, available: u32) -> CatalogItem {
    CatalogItem {
        id: ItemId::from(id),
        name: name.into(),
        description: None,
        sku: Some(format!("SKU-{}", id.to_uppercase())),
        unit: Some("pcs".into()),
        unit_cost: None,
        available_quantity: available,
        warehouse_id: WarehouseId::from(warehouse),
    }
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn transfer(
    id: &str,
    sender: &str,
    recipient: &str,
    status: TransferStatus,
    created_at: DateTime<Utc>,
) -> TransferDetail {
    TransferDetail {
        summary: TransferSummary {
            id: TransferId::from(id),
            sender: Party {
                id: UserId::from(sender),
                name: None,
            },
            recipient: Party {
                id: UserId::from(recipient),
                name: None,
            },
            status,
            item_count: 1,
            notes: None,
            created_at,
            rejection_reason: None,
        },
        items: vec![TransferItem {
            item_id: ItemId::from("drill"),
            name: "Drill".into(),
            sku: None,
            description: None,
            quantity: 1,
            image_url: None,
            warehouse_id: None,
        }],
        image_url: Some("https://img.example/tr.jpg".into()),
        warehouse_id: Some(WarehouseId::from("W1")),
    }
}

pub fn factory(api: Arc<FakeInventoryApi>) -> ServiceFactory {
    let mut config = AppConfig::default();
    config.page_size = 2;
    ServiceFactory::new(api, config)
}

pub fn user(id: &str) -> SessionUser {
    SessionUser::new(id, format!("User {}", id))
}
