use std::sync::Arc;

use crate::{
    backend::{HttpInventoryApi, InventoryApi},
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    services::{
        draft::RequestDraft,
        hierarchy::HierarchySelector,
        submission::RequestSubmissionCoordinator,
        transfers::{TransferLifecycle, TransferSettings},
    },
    session::{Connectivity, Session, SessionUser},
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    api: Arc<dyn InventoryApi>,
    config: AppConfig,
    connectivity: Connectivity,
    event_sender: Option<EventSender>,
}

impl ServiceFactory {
    pub fn new(api: Arc<dyn InventoryApi>, config: AppConfig) -> Self {
        Self {
            api,
            config,
            connectivity: Connectivity::new(),
            event_sender: None,
        }
    }

    /// Builds the HTTP backend client from `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, ServiceError> {
        let api = HttpInventoryApi::from_config(&config)?;
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.connectivity = self.connectivity.with_events(event_sender.clone());
        self.event_sender = Some(event_sender);
        self
    }

    /// Starts a session sharing this factory's offline flag
    pub fn session(&self, user: SessionUser) -> Session {
        Session::with_connectivity(user, self.connectivity.clone())
    }

    pub fn transfer_lifecycle(&self, user: SessionUser) -> TransferLifecycle {
        let lifecycle = TransferLifecycle::new(
            self.api.clone(),
            user,
            self.connectivity.clone(),
            TransferSettings::from_app_config(&self.config),
        );
        match &self.event_sender {
            Some(events) => lifecycle.with_events(events.clone()),
            None => lifecycle,
        }
    }

    pub fn submission_coordinator(&self) -> RequestSubmissionCoordinator {
        let coordinator = RequestSubmissionCoordinator::from_config(self.api.clone(), &self.config);
        match &self.event_sender {
            Some(events) => coordinator.with_events(events.clone()),
            None => coordinator,
        }
    }

    pub fn hierarchy_selector(&self) -> HierarchySelector {
        HierarchySelector::new(self.connectivity.clone())
    }

    pub fn request_draft(&self) -> RequestDraft {
        RequestDraft::new(self.connectivity.clone())
    }

    pub fn api(&self) -> &Arc<dyn InventoryApi> {
        &self.api
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }
}
