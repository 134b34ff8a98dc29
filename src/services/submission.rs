use crate::{
    backend::InventoryApi,
    config::AppConfig,
    domain::{BorrowRequestPayload, BorrowRequestReceipt, HierarchyLevel, RequestItemLine},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{draft::RequestDraft, stock},
    session::{BusyFlags, Session},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument};
use url::Url;

/// What the user confirms before a borrow request is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationSummary {
    pub company: String,
    pub item_count: usize,
    pub total_quantity: u32,
    pub return_date: Option<NaiveDate>,
}

impl fmt::Display for ConfirmationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Borrow {} item(s) ({} units) for {}",
            self.item_count, self.total_quantity, self.company
        )?;
        match self.return_date {
            Some(date) => write!(f, ", returning {}", date.format("%Y-%m-%d")),
            None => write!(f, ", no return date set"),
        }
    }
}

/// A validated request waiting for confirmation.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub payload: BorrowRequestPayload,
    pub summary: ConfirmationSummary,
    revision: u64,
}

impl PendingSubmission {
    /// Draft revision this submission was prepared from.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Turns a [`RequestDraft`] into a borrow request.
///
/// Submission is two-phase: [`prepare`](Self::prepare) validates and produces a
/// confirmation, [`commit`](Self::commit) sends it. A failed commit leaves the
/// draft exactly as it was.
#[derive(Clone)]
pub struct RequestSubmissionCoordinator {
    api: Arc<dyn InventoryApi>,
    max_zip_code_length: usize,
    busy: BusyFlags<&'static str>,
    events: Option<EventSender>,
}

const COMMIT: &str = "submit borrow request";

impl RequestSubmissionCoordinator {
    pub fn new(api: Arc<dyn InventoryApi>, max_zip_code_length: usize) -> Self {
        Self {
            api,
            max_zip_code_length,
            busy: BusyFlags::new(),
            events: None,
        }
    }

    pub fn from_config(api: Arc<dyn InventoryApi>, config: &AppConfig) -> Self {
        Self::new(api, config.max_zip_code_length)
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.busy.is_busy(&COMMIT)
    }

    /// Runs every submission rule in order and stops at the first failure.
    pub fn validate(&self, draft: &RequestDraft, session: &Session) -> Result<(), ServiceError> {
        session
            .connectivity
            .ensure_online("Submitting a borrow request")?;

        let details = draft.details();
        if let Some(raw) = details.google_maps_url() {
            let valid = Url::parse(raw)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
                .unwrap_or(false);
            if !valid {
                return Err(ServiceError::ValidationError(
                    "Google Maps link is not a valid URL".into(),
                ));
            }
        }
        if let Some(zip) = details.zip_code() {
            if zip.chars().count() > self.max_zip_code_length {
                return Err(ServiceError::ValidationError(format!(
                    "Zip code must be at most {} characters",
                    self.max_zip_code_length
                )));
            }
        }

        let hierarchy = draft.hierarchy();
        if hierarchy.selected(HierarchyLevel::Project).is_none() {
            return Err(ServiceError::ValidationError("Please select a project".into()));
        }
        if hierarchy.selected(HierarchyLevel::WorkOrder).is_none() {
            return Err(ServiceError::ValidationError(
                "Please select a work order".into(),
            ));
        }

        let selection = draft.selection();
        if selection.warehouse().is_none() {
            return Err(ServiceError::ValidationError("Please select a warehouse".into()));
        }
        if selection.rows().is_empty() {
            return Err(ServiceError::ValidationError("Add at least one item".into()));
        }
        for (position, row) in selection.rows().iter().enumerate() {
            let entry = row.entry.as_ref().ok_or_else(|| {
                ServiceError::ValidationError(format!("Select an item for row {}", position + 1))
            })?;
            if !stock::validate(&entry.item, entry.quantity) {
                return Err(ServiceError::ValidationError(format!(
                    "Requested quantity of {} ({}) exceeds the {} available",
                    entry.item.name, entry.quantity, entry.item.available_quantity
                )));
            }
        }
        Ok(())
    }

    /// Validates the draft and builds the confirmation.
    pub fn prepare(
        &self,
        draft: &RequestDraft,
        session: &Session,
    ) -> Result<PendingSubmission, ServiceError> {
        self.validate(draft, session)?;

        let chain = draft.hierarchy().require_chain(true)?;
        let warehouse_id = draft
            .warehouse()
            .cloned()
            .ok_or_else(|| ServiceError::ValidationError("Please select a warehouse".into()))?;
        let work_order_id = chain
            .work_order_id()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::ValidationError("Please select a work order".into()))?;
        let details = draft.details();
        let items: Vec<RequestItemLine> = draft
            .selection()
            .entries()
            .map(|e| RequestItemLine {
                item_id: e.item_id().clone(),
                quantity_requested: e.quantity,
            })
            .collect();

        let summary = ConfirmationSummary {
            company: chain.company.name.clone(),
            item_count: items.len(),
            total_quantity: items.iter().map(|i| i.quantity_requested).sum(),
            return_date: details.return_date,
        };
        let payload = BorrowRequestPayload {
            requester_id: session.user_id().clone(),
            warehouse_id,
            company_id: chain.company.id.clone(),
            customer_id: chain.customer.id.clone(),
            department_id: chain.department_id().map(str::to_string),
            project_id: chain.project.id.clone(),
            work_order_id,
            expected_return_date: details.return_date,
            notes: non_blank(details.notes.as_deref()),
            address: non_blank(details.address.as_deref()),
            google_maps_url: details.google_maps_url().map(str::to_string),
            zip_code: details.zip_code().map(str::to_string),
            items,
        };

        Ok(PendingSubmission {
            payload,
            summary,
            revision: draft.revision(),
        })
    }

    /// Sends a confirmed submission.
    ///
    /// On success the draft and the session cart are cleared. On any failure
    /// both are left untouched so the user can retry.
    #[instrument(skip_all, fields(user = %session.user.id, items = pending.payload.items.len()))]
    pub async fn commit(
        &self,
        pending: &PendingSubmission,
        draft: &mut RequestDraft,
        session: &mut Session,
    ) -> Result<BorrowRequestReceipt, ServiceError> {
        let _guard = self.busy.acquire(COMMIT)?;
        if draft.revision() != pending.revision {
            return Err(ServiceError::ValidationError(
                "The request changed after it was confirmed; review it again".into(),
            ));
        }
        session
            .connectivity
            .ensure_online("Submitting a borrow request")?;

        let result = self.api.create_borrow_request(&pending.payload).await;
        session.connectivity.observe(&result);
        let receipt = result.map_err(|e| {
            error!(kind = %e.kind(), "Borrow request submission failed: {}", e);
            e
        })?;

        info!(request_id = %receipt.id, "Borrow request submitted");
        draft.clear();
        session.cart.clear();
        if let Some(events) = &self.events {
            events
                .send_or_log(Event::BorrowRequestSubmitted {
                    request_id: receipt.id.clone(),
                    item_count: pending.payload.items.len(),
                })
                .await;
        }
        Ok(receipt)
    }

    /// Re-sends the same confirmation after the user chose "Retry" on a failed
    /// commit. A connection lost on the previous attempt does not block it.
    pub async fn retry_commit(
        &self,
        pending: &PendingSubmission,
        draft: &mut RequestDraft,
        session: &mut Session,
    ) -> Result<BorrowRequestReceipt, ServiceError> {
        session.connectivity.allow_retry();
        self.commit(pending, draft, session).await
    }

    /// `prepare` followed directly by `commit`, for callers that confirm up front.
    pub async fn submit(
        &self,
        draft: &mut RequestDraft,
        session: &mut Session,
    ) -> Result<BorrowRequestReceipt, ServiceError> {
        let pending = self.prepare(draft, session)?;
        self.commit(&pending, draft, session).await
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
