//! Transfer Lifecycle Service
//!
//! Peer-to-peer transfers between users: a sender creates a transfer
//! (Pending), and the recipient either accepts it into one of their projects
//! (Completed) or rejects it with a reason (Rejected). While still pending, the
//! sender may cancel it, which deletes the record.

use crate::{
    backend::{AcceptTransferRequest, CreateTransferRequest, InventoryApi, TransferQuery},
    config::AppConfig,
    domain::{
        AcceptTransfer, CatalogItem, ItemId, TransferDetail, TransferDirection, TransferId,
        TransferLine, TransferStatus, TransferSummary, UserId, WarehouseId,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{cart::RequestCart, stock::QuantityEdit},
    session::{BusyFlags, Connectivity, SessionUser},
};
use futures::future::try_join;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

/// Actions that may not run twice at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferAction {
    Create,
    RefreshQueue,
    /// Accept, reject or cancel of one transfer.
    Update(TransferId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub require_work_order: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 20,
            require_work_order: false,
        }
    }
}

impl TransferSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_queue_pages,
            require_work_order: config.require_work_order_on_accept,
        }
    }
}

/// A transfer as seen by the current user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferView {
    #[serde(flatten)]
    pub summary: TransferSummary,
    pub direction: TransferDirection,
}

impl TransferView {
    pub fn new(summary: TransferSummary, current_user: &UserId) -> Self {
        let direction = summary.direction_for(current_user);
        Self { summary, direction }
    }

    pub fn id(&self) -> &TransferId {
        &self.summary.id
    }

    pub fn status(&self) -> &TransferStatus {
        &self.summary.status
    }

    /// Accept and reject are open to the recipient of a pending transfer.
    pub fn can_respond(&self) -> bool {
        self.direction == TransferDirection::Incoming && self.summary.status.is_pending()
    }

    pub fn can_cancel(&self) -> bool {
        self.direction == TransferDirection::Outgoing && self.summary.status.is_pending()
    }
}

/// Sender-side input for [`TransferLifecycle::create`].
///
/// Items are held in a [`RequestCart`] whose snapshots describe what the sender
/// currently holds, so quantities are clamped to the held amount.
#[derive(Debug, Clone, Default)]
pub struct TransferDraft {
    pub recipient: Option<UserId>,
    pub warehouse_id: Option<WarehouseId>,
    pub project_id: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    items: RequestCart,
}

impl TransferDraft {
    pub fn new(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Self::default()
        }
    }

    pub fn recipient(mut self, recipient: impl Into<UserId>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn photo(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Adds a held item; `quantity` is clamped to `held.available_quantity`.
    pub fn add_item(&mut self, held: &CatalogItem, quantity: i64) -> Result<QuantityEdit, ServiceError> {
        self.items.add_with_quantity(held, quantity)
    }

    pub fn set_quantity(&mut self, item_id: &ItemId, quantity: i64) -> Result<QuantityEdit, ServiceError> {
        self.items.set_quantity(item_id, quantity)
    }

    pub fn remove_item(&mut self, item_id: &ItemId) -> bool {
        self.items.remove(item_id).is_some()
    }

    pub fn items(&self) -> &RequestCart {
        &self.items
    }

    /// Checks the create preconditions and builds the request body.
    pub fn to_request(&self, sender: &UserId) -> Result<CreateTransferRequest, ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Select at least one item to transfer".into(),
            ));
        }
        let image_url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServiceError::ValidationError("A photo is required".into()))?;
        let recipient = self
            .recipient
            .clone()
            .ok_or_else(|| ServiceError::ValidationError("Choose a recipient".into()))?;
        if &recipient == sender {
            return Err(ServiceError::ValidationError(
                "You cannot transfer items to yourself".into(),
            ));
        }
        let warehouse_id = self
            .warehouse_id
            .clone()
            .ok_or_else(|| ServiceError::ValidationError("Choose a source warehouse".into()))?;

        Ok(CreateTransferRequest {
            sender_id: sender.clone(),
            recipient_id: recipient,
            warehouse_id,
            project_id: self.project_id.clone(),
            image_url: image_url.to_string(),
            notes: self.notes.clone(),
            items: self
                .items
                .entries()
                .iter()
                .map(|e| TransferLine {
                    item_id: e.item_id().clone(),
                    quantity: e.quantity,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Default)]
struct TransferStore {
    summaries: HashMap<TransferId, TransferSummary>,
    /// Pending transfers, newest first.
    queue: Vec<TransferId>,
    details: HashMap<TransferId, TransferDetail>,
}

impl TransferStore {
    fn find(&self, id: &TransferId) -> Option<TransferSummary> {
        self.summaries
            .get(id)
            .or_else(|| self.details.get(id).map(|d| &d.summary))
            .cloned()
    }

    fn set_status(&mut self, id: &TransferId, status: TransferStatus, reason: Option<&str>) {
        let apply = |summary: &mut TransferSummary| {
            summary.status = status.clone();
            if let Some(reason) = reason {
                summary.rejection_reason = Some(reason.to_string());
            }
        };
        if let Some(summary) = self.summaries.get_mut(id) {
            apply(summary);
        }
        if let Some(detail) = self.details.get_mut(id) {
            apply(&mut detail.summary);
            if !self.summaries.contains_key(id) {
                self.summaries.insert(id.clone(), detail.summary.clone());
            }
        }
        if !status.is_pending() {
            self.queue.retain(|q| q != id);
        }
    }

    fn remove(&mut self, id: &TransferId) {
        self.summaries.remove(id);
        self.details.remove(id);
        self.queue.retain(|q| q != id);
    }
}

/// Transfer state machine bound to the current user.
///
/// Local state is only changed after the backend confirmed an action; the
/// queue is then reloaded from the backend.
#[derive(Clone)]
pub struct TransferLifecycle {
    api: Arc<dyn InventoryApi>,
    user: SessionUser,
    connectivity: Connectivity,
    settings: TransferSettings,
    store: Arc<Mutex<TransferStore>>,
    busy: BusyFlags<TransferAction>,
    events: Option<EventSender>,
}

impl TransferLifecycle {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        user: SessionUser,
        connectivity: Connectivity,
        settings: TransferSettings,
    ) -> Self {
        Self {
            api,
            user,
            connectivity,
            settings,
            store: Arc::new(Mutex::new(TransferStore::default())),
            busy: BusyFlags::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    fn store(&self) -> MutexGuard<'_, TransferStore> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn notify(&self, event: Event) {
        if let Some(events) = &self.events {
            events.send_or_log(event).await;
        }
    }

    pub fn is_busy(&self, action: &TransferAction) -> bool {
        self.busy.is_busy(action)
    }

    fn view(&self, summary: TransferSummary) -> TransferView {
        TransferView::new(summary, &self.user.id)
    }

    /// The pending work queue as last loaded, newest first.
    pub fn queue(&self) -> Vec<TransferView> {
        let store = self.store();
        store
            .queue
            .iter()
            .filter_map(|id| store.summaries.get(id))
            .cloned()
            .map(|s| self.view(s))
            .collect()
    }

    /// Locally known state of a transfer, if any.
    pub fn get(&self, id: &TransferId) -> Option<TransferView> {
        let summary = self.store().find(id)?;
        Some(self.view(summary))
    }

    /// Fetches every page of one side of the queue.
    async fn fetch_side(
        &self,
        query: impl Fn(u32) -> TransferQuery,
    ) -> Result<Vec<TransferSummary>, ServiceError> {
        let mut all = Vec::new();
        for page_number in 1..=self.settings.max_pages.max(1) {
            let page = self.api.list_transfers(&query(page_number)).await?;
            let short = page.len() < self.settings.page_size as usize;
            all.extend(page);
            if short {
                break;
            }
            if page_number == self.settings.max_pages {
                warn!(pages = page_number, "Transfer queue truncated at page limit");
            }
        }
        Ok(all)
    }

    /// Reloads incoming and outgoing pending transfers.
    ///
    /// Both sides are fetched independently, merged by id and filtered to
    /// Pending. Transfers this session already moved to a terminal state are
    /// kept so that later actions on them fail locally.
    #[instrument(skip(self), fields(user = %self.user.id))]
    pub async fn refresh_queue(&self) -> Result<Vec<TransferView>, ServiceError> {
        let _guard = self.busy.acquire(TransferAction::RefreshQueue)?;
        self.connectivity.ensure_online("Loading transfers")?;

        let user = self.user.id.clone();
        let size = self.settings.page_size;
        let result = try_join(
            self.fetch_side(|page| TransferQuery::incoming(user.clone(), page, size)),
            self.fetch_side(|page| TransferQuery::outgoing(user.clone(), page, size)),
        )
        .await;
        self.connectivity.observe(&result);
        let (incoming, outgoing) = result.map_err(|e| {
            error!("Failed to load transfer queue: {}", e);
            e
        })?;

        let mut seen = HashSet::new();
        let mut merged: Vec<TransferSummary> = incoming
            .into_iter()
            .chain(outgoing)
            .filter(|s| seen.insert(s.id.clone()))
            .collect();
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let pending = {
            let mut store = self.store();
            let mut summaries: HashMap<TransferId, TransferSummary> = store
                .summaries
                .drain()
                .filter(|(_, s)| s.status.is_terminal())
                .collect();
            let mut queue = Vec::new();
            for summary in merged {
                if summaries.contains_key(&summary.id) {
                    debug!(
                        transfer_id = %summary.id,
                        listed = %summary.status,
                        "Backend still lists a transfer this session finished; keeping local status"
                    );
                    continue;
                }
                if summary.status.is_pending() {
                    queue.push(summary.id.clone());
                }
                summaries.insert(summary.id.clone(), summary);
            }
            store.summaries = summaries;
            store.queue = queue;
            store.queue.len()
        };

        info!(pending, "Transfer queue refreshed");
        self.notify(Event::TransferQueueRefreshed { pending }).await;
        Ok(self.queue())
    }

    /// Reload after a successful mutation. A failure here does not undo the
    /// mutation, so it is only logged.
    async fn reload_after_mutation(&self) {
        if let Err(e) = self.refresh_queue().await {
            warn!("Transfer queue reload after update failed: {}", e);
        }
    }

    /// Full detail of a transfer, fetched on first use and cached.
    #[instrument(skip(self))]
    pub async fn detail(&self, id: &TransferId) -> Result<TransferDetail, ServiceError> {
        let cached = self.store().details.get(id).cloned();
        if let Some(detail) = cached {
            debug!(transfer_id = %id, "Transfer detail served from cache");
            return Ok(detail);
        }

        self.connectivity.ensure_online("Loading transfer details")?;
        let result = self.api.get_transfer(id).await;
        self.connectivity.observe(&result);
        let detail = result.map_err(|e| {
            error!(transfer_id = %id, "Failed to load transfer detail: {}", e);
            e
        })?;

        let mut store = self.store();
        let detail = store
            .details
            .entry(id.clone())
            .or_insert(detail)
            .clone();
        Ok(detail)
    }

    /// Local summary, or the fetched detail's summary for an unseen transfer.
    async fn resolve(&self, id: &TransferId) -> Result<TransferView, ServiceError> {
        if let Some(view) = self.get(id) {
            return Ok(view);
        }
        let detail = self.detail(id).await?;
        Ok(self.view(detail.summary))
    }

    fn ensure_pending(view: &TransferView) -> Result<(), ServiceError> {
        if view.summary.status.is_pending() {
            Ok(())
        } else {
            Err(ServiceError::InvalidStatus(format!(
                "Transfer {} is {}, not Pending",
                view.id(),
                view.summary.status
            )))
        }
    }

    fn ensure_direction(
        view: &TransferView,
        expected: TransferDirection,
        action: &str,
    ) -> Result<(), ServiceError> {
        if view.direction == expected {
            return Ok(());
        }
        let actor = match expected {
            TransferDirection::Incoming => "recipient",
            TransferDirection::Outgoing => "sender",
        };
        Err(ServiceError::Forbidden(format!(
            "Only the {} can {} transfer {}",
            actor,
            action,
            view.id()
        )))
    }

    /// Sends a new transfer. The result is Pending.
    #[instrument(skip(self, draft), fields(sender = %self.user.id))]
    pub async fn create(&self, draft: &TransferDraft) -> Result<TransferView, ServiceError> {
        let request = draft.to_request(&self.user.id)?;
        let guard = self.busy.acquire(TransferAction::Create)?;
        self.connectivity.ensure_online("Sending a transfer")?;

        let result = self.api.create_transfer(&request).await;
        self.connectivity.observe(&result);
        let summary = result.map_err(|e| {
            error!("Failed to create transfer: {}", e);
            e
        })?;

        info!(transfer_id = %summary.id, items = request.items.len(), "Transfer created");
        let view = self.view(summary.clone());
        self.store().summaries.insert(summary.id.clone(), summary);
        self.notify(Event::TransferCreated(view.id().clone())).await;
        drop(guard);
        self.reload_after_mutation().await;
        Ok(view)
    }

    /// Recipient accepts a pending incoming transfer into a resolved chain.
    #[instrument(skip(self, accept), fields(user = %self.user.id))]
    pub async fn accept(
        &self,
        id: &TransferId,
        accept: &AcceptTransfer,
    ) -> Result<TransferView, ServiceError> {
        let guard = self.busy.acquire(TransferAction::Update(id.clone()))?;
        self.connectivity.ensure_online("Accepting a transfer")?;

        let view = self.resolve(id).await?;
        Self::ensure_pending(&view)?;
        Self::ensure_direction(&view, TransferDirection::Incoming, "accept")?;
        validate_chain(accept, self.settings.require_work_order)?;

        let request = AcceptTransferRequest::from(accept);
        let result = self.api.accept_transfer(id, &self.user.id, &request).await;
        self.connectivity.observe(&result);
        result.map_err(|e| {
            error!(transfer_id = %id, "Failed to accept transfer: {}", e);
            e
        })?;

        info!(transfer_id = %id, project_id = %request.project_id, "Transfer accepted");
        self.store().set_status(id, TransferStatus::Completed, None);
        self.notify(Event::TransferAccepted(id.clone())).await;
        drop(guard);
        self.reload_after_mutation().await;
        self.get(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {}", id)))
    }

    /// Recipient declines a pending incoming transfer.
    ///
    /// A blank reason is rejected before anything else happens.
    #[instrument(skip(self, reason), fields(user = %self.user.id))]
    pub async fn reject(&self, id: &TransferId, reason: &str) -> Result<TransferView, ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "A reason is required to reject a transfer".into(),
            ));
        }
        let guard = self.busy.acquire(TransferAction::Update(id.clone()))?;
        self.connectivity.ensure_online("Rejecting a transfer")?;

        let view = self.resolve(id).await?;
        Self::ensure_pending(&view)?;
        Self::ensure_direction(&view, TransferDirection::Incoming, "reject")?;

        let result = self.api.reject_transfer(id, &self.user.id, reason).await;
        self.connectivity.observe(&result);
        result.map_err(|e| {
            error!(transfer_id = %id, "Failed to reject transfer: {}", e);
            e
        })?;

        info!(transfer_id = %id, "Transfer rejected");
        self.store()
            .set_status(id, TransferStatus::Rejected, Some(reason));
        self.notify(Event::TransferRejected {
            transfer_id: id.clone(),
            reason: reason.to_string(),
        })
        .await;
        drop(guard);
        self.reload_after_mutation().await;
        self.get(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {}", id)))
    }

    /// Sender withdraws a pending outgoing transfer; the record is deleted.
    #[instrument(skip(self), fields(user = %self.user.id))]
    pub async fn cancel(&self, id: &TransferId) -> Result<(), ServiceError> {
        let guard = self.busy.acquire(TransferAction::Update(id.clone()))?;
        self.connectivity.ensure_online("Cancelling a transfer")?;

        let view = self.resolve(id).await?;
        Self::ensure_direction(&view, TransferDirection::Outgoing, "cancel")?;
        Self::ensure_pending(&view)?;

        let result = self.api.cancel_transfer(id, &self.user.id).await;
        self.connectivity.observe(&result);
        result.map_err(|e| {
            error!(transfer_id = %id, "Failed to cancel transfer: {}", e);
            e
        })?;

        info!(transfer_id = %id, "Transfer cancelled");
        self.store().remove(id);
        self.notify(Event::TransferCancelled(id.clone())).await;
        drop(guard);
        self.reload_after_mutation().await;
        Ok(())
    }
}

fn validate_chain(accept: &AcceptTransfer, require_work_order: bool) -> Result<(), ServiceError> {
    let chain = &accept.chain;
    let missing = [
        ("company", chain.company.id.as_str()),
        ("customer", chain.customer.id.as_str()),
        ("project", chain.project.id.as_str()),
    ]
    .into_iter()
    .find(|(_, id)| id.trim().is_empty());
    if let Some((level, _)) = missing {
        return Err(ServiceError::ValidationError(format!(
            "Please select a {}",
            level
        )));
    }
    if require_work_order && chain.work_order_id().map_or(true, |id| id.trim().is_empty()) {
        return Err(ServiceError::ValidationError(
            "Please select a work order".into(),
        ));
    }
    Ok(())
}
