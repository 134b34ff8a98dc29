use crate::{
    domain::{CatalogItem, DraftDetails, WarehouseId},
    services::{
        cart::RequestCart, hierarchy::HierarchySelector, item_selection::ItemSelectionController,
    },
    session::Connectivity,
};
use tracing::info;

/// A borrow request being composed.
///
/// All mutable access goes through the `*_mut` accessors, which bump the
/// draft revision. A confirmation taken at one revision cannot be committed
/// once the draft has moved on.
#[derive(Debug)]
pub struct RequestDraft {
    selection: ItemSelectionController,
    hierarchy: HierarchySelector,
    details: DraftDetails,
    revision: u64,
}

impl RequestDraft {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            selection: ItemSelectionController::new(),
            hierarchy: HierarchySelector::new(connectivity),
            details: DraftDetails::default(),
            revision: 0,
        }
    }

    /// A draft whose rows come from the shopping cart. The cart itself is not
    /// modified.
    pub fn seed_from_cart(
        cart: &RequestCart,
        catalog: Vec<CatalogItem>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            selection: ItemSelectionController::seed_from_cart(cart, catalog),
            ..Self::new(connectivity)
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selection(&self) -> &ItemSelectionController {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut ItemSelectionController {
        self.revision += 1;
        &mut self.selection
    }

    pub fn hierarchy(&self) -> &HierarchySelector {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut HierarchySelector {
        self.revision += 1;
        &mut self.hierarchy
    }

    pub fn details(&self) -> &DraftDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut DraftDetails {
        self.revision += 1;
        &mut self.details
    }

    pub fn warehouse(&self) -> Option<&WarehouseId> {
        self.selection.warehouse()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
            && self.details == DraftDetails::default()
            && self.hierarchy.scope() == Default::default()
    }

    /// Drops rows, hierarchy selection and metadata. The warehouse is kept so
    /// the user can start over in place.
    pub fn clear(&mut self) {
        self.selection.clear();
        self.hierarchy.clear();
        self.details = DraftDetails::default();
        self.revision += 1;
    }

    /// Abandons the draft. The shopping cart it may have been seeded from is
    /// left untouched.
    pub fn cancel(&mut self) {
        info!(rows = self.selection.rows().len(), "Draft cancelled");
        self.clear();
    }
}
