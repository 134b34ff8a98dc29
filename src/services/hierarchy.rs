use crate::{
    backend::InventoryApi,
    domain::{HierarchyChain, HierarchyLevel, HierarchyNode, HierarchyScope},
    errors::ServiceError,
    session::Connectivity,
};
use tracing::{debug, info, instrument, warn};

/// Where a single level of the chain currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelState {
    Unselected,
    Loading,
    Loaded,
    Selected,
}

#[derive(Debug, Default)]
struct LevelSlot {
    options: Vec<HierarchyNode>,
    selected: Option<HierarchyNode>,
    /// Ancestor path the current options were loaded for.
    loaded_for: Option<HierarchyScope>,
    loading: bool,
    /// Bumped whenever an ancestor changes so in-flight loads can be discarded.
    generation: u64,
}

impl LevelSlot {
    fn reset(&mut self) {
        self.options.clear();
        self.selected = None;
        self.loaded_for = None;
        self.loading = false;
        self.generation += 1;
    }
}

/// Proof that a load was started; hand it back to [`HierarchySelector::complete_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub level: HierarchyLevel,
    pub scope: HierarchyScope,
    generation: u64,
}

/// Company → Customer → Project → Work order selection chain.
///
/// Each level is loaded lazily once all of its ancestors are selected, and
/// only once per ancestor path. Changing a selection wipes every level below
/// it, and any load still in flight for those levels is ignored when it
/// completes.
#[derive(Debug)]
pub struct HierarchySelector {
    slots: [LevelSlot; 4],
    connectivity: Connectivity,
}

impl HierarchySelector {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            slots: Default::default(),
            connectivity,
        }
    }

    fn slot(&self, level: HierarchyLevel) -> &LevelSlot {
        &self.slots[level.index()]
    }

    fn slot_mut(&mut self, level: HierarchyLevel) -> &mut LevelSlot {
        &mut self.slots[level.index()]
    }

    pub fn state(&self, level: HierarchyLevel) -> LevelState {
        let slot = self.slot(level);
        if slot.selected.is_some() {
            LevelState::Selected
        } else if slot.loading {
            LevelState::Loading
        } else if slot.loaded_for.is_some() {
            LevelState::Loaded
        } else {
            LevelState::Unselected
        }
    }

    /// A level's control is usable once every ancestor is selected and it is
    /// not waiting on a load.
    pub fn is_enabled(&self, level: HierarchyLevel) -> bool {
        !self.slot(level).loading
            && level
                .ancestors()
                .iter()
                .all(|a| self.slot(*a).selected.is_some())
    }

    pub fn options(&self, level: HierarchyLevel) -> &[HierarchyNode] {
        &self.slot(level).options
    }

    pub fn selected(&self, level: HierarchyLevel) -> Option<&HierarchyNode> {
        self.slot(level).selected.as_ref()
    }

    /// Ids of every selected level above the work order.
    pub fn scope(&self) -> HierarchyScope {
        let id = |level| self.selected(level).map(|n| n.id().to_string());
        HierarchyScope {
            company_id: id(HierarchyLevel::Company),
            customer_id: id(HierarchyLevel::Customer),
            project_id: id(HierarchyLevel::Project),
        }
    }

    /// Starts a load of `level`.
    ///
    /// Returns `Ok(None)` when the options for the current ancestor path are
    /// already cached.
    ///
    /// # Errors
    ///
    /// * `Offline` - the client is offline
    /// * `ValidationError` - an ancestor is not selected yet
    /// * `Busy` - a load of this level is already running
    pub fn begin_load(&mut self, level: HierarchyLevel) -> Result<Option<LoadTicket>, ServiceError> {
        self.connectivity
            .ensure_online(&format!("Loading {} options", level))?;

        if let Some(missing) = level
            .ancestors()
            .iter()
            .find(|a| self.slot(**a).selected.is_none())
        {
            return Err(ServiceError::ValidationError(format!(
                "Select a {} before choosing a {}",
                missing, level
            )));
        }

        let scope = self.scope().for_level(level);
        let slot = self.slot_mut(level);
        if slot.loading {
            return Err(ServiceError::Busy(format!("{} options are loading", level)));
        }
        if slot.loaded_for.as_ref() == Some(&scope) {
            debug!(%level, "Options already loaded for this path");
            return Ok(None);
        }

        slot.loading = true;
        Ok(Some(LoadTicket {
            level,
            scope,
            generation: slot.generation,
        }))
    }

    /// Applies the outcome of a load started with [`begin_load`](Self::begin_load).
    ///
    /// Returns `Ok(false)` when the result was discarded because an ancestor
    /// changed while it was in flight. A failed load puts the level back to
    /// [`LevelState::Unselected`] and returns the error; ancestors are untouched.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<HierarchyNode>, ServiceError>,
    ) -> Result<bool, ServiceError> {
        let slot = self.slot_mut(ticket.level);
        if slot.generation != ticket.generation {
            debug!(level = %ticket.level, "Discarding stale hierarchy load");
            return Ok(false);
        }

        slot.loading = false;
        match result {
            Ok(nodes) => {
                slot.options = nodes;
                slot.loaded_for = Some(ticket.scope);
                Ok(true)
            }
            Err(err) => {
                slot.options.clear();
                slot.selected = None;
                slot.loaded_for = None;
                warn!(level = %ticket.level, "Failed to load hierarchy options: {}", err);
                Err(err)
            }
        }
    }

    /// Loads `level` if it is not cached for the current ancestor path.
    #[instrument(skip(self, api))]
    pub async fn load(
        &mut self,
        level: HierarchyLevel,
        api: &dyn InventoryApi,
    ) -> Result<(), ServiceError> {
        let Some(ticket) = self.begin_load(level)? else {
            return Ok(());
        };
        let result = fetch_level(api, level, &ticket.scope).await;
        self.connectivity.observe(&result);
        self.complete_load(ticket, result).map(|_| ())
    }

    /// First interaction with the chain: loads the company list.
    pub async fn open(&mut self, api: &dyn InventoryApi) -> Result<(), ServiceError> {
        self.load(HierarchyLevel::Company, api).await
    }

    /// Commits `id` at `level` and clears every level below it.
    ///
    /// Re-selecting the current value is a no-op.
    pub fn select(&mut self, level: HierarchyLevel, id: &str) -> Result<(), ServiceError> {
        let slot = self.slot(level);
        if slot.selected.as_ref().is_some_and(|n| n.id() == id) {
            return Ok(());
        }
        let node = slot
            .options
            .iter()
            .find(|n| n.id() == id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("{} is not an available {}", id, level))
            })?;

        info!(%level, id, "Hierarchy selection changed");
        self.slot_mut(level).selected = Some(node);
        for descendant in level.descendants() {
            self.slot_mut(*descendant).reset();
        }
        Ok(())
    }

    /// Selects `id` and loads the next level down.
    pub async fn select_and_load(
        &mut self,
        level: HierarchyLevel,
        id: &str,
        api: &dyn InventoryApi,
    ) -> Result<(), ServiceError> {
        self.select(level, id)?;
        match level.child() {
            Some(child) => self.load(child, api).await,
            None => Ok(()),
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    /// The resolved chain, if company, customer and project are selected.
    pub fn chain(&self) -> Option<HierarchyChain> {
        let company = match self.selected(HierarchyLevel::Company)? {
            HierarchyNode::Company(c) => c.clone(),
            _ => return None,
        };
        let customer = match self.selected(HierarchyLevel::Customer)? {
            HierarchyNode::Customer(c) => c.clone(),
            _ => return None,
        };
        let project = match self.selected(HierarchyLevel::Project)? {
            HierarchyNode::Project(p) => p.clone(),
            _ => return None,
        };
        let work_order = match self.selected(HierarchyLevel::WorkOrder) {
            Some(HierarchyNode::WorkOrder(w)) => Some(w.clone()),
            _ => None,
        };
        Some(HierarchyChain {
            company,
            customer,
            project,
            work_order,
        })
    }

    /// Like [`chain`](Self::chain) but names the first missing level.
    pub fn require_chain(&self, require_work_order: bool) -> Result<HierarchyChain, ServiceError> {
        let last = if require_work_order {
            HierarchyLevel::WorkOrder
        } else {
            HierarchyLevel::Project
        };
        if let Some(missing) = HierarchyLevel::ALL[..=last.index()]
            .iter()
            .find(|l| self.selected(**l).is_none())
        {
            return Err(ServiceError::ValidationError(format!(
                "Please select a {}",
                missing
            )));
        }
        self.chain()
            .ok_or_else(|| ServiceError::ValidationError("Hierarchy selection is incomplete".into()))
    }
}

/// Fetches the options of one level for an ancestor scope.
pub async fn fetch_level(
    api: &dyn InventoryApi,
    level: HierarchyLevel,
    scope: &HierarchyScope,
) -> Result<Vec<HierarchyNode>, ServiceError> {
    let nodes = match level {
        HierarchyLevel::Company => api
            .list_companies()
            .await?
            .into_iter()
            .map(HierarchyNode::Company)
            .collect(),
        HierarchyLevel::Customer => api
            .list_customers(scope)
            .await?
            .into_iter()
            .map(HierarchyNode::Customer)
            .collect(),
        HierarchyLevel::Project => api
            .list_projects(scope)
            .await?
            .into_iter()
            .map(HierarchyNode::Project)
            .collect(),
        HierarchyLevel::WorkOrder => api
            .list_work_orders(scope)
            .await?
            .into_iter()
            .map(HierarchyNode::WorkOrder)
            .collect(),
    };
    Ok(nodes)
}
