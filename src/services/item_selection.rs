use crate::{
    domain::{CartEntry, CatalogItem, ItemId, WarehouseId},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::RequestCart,
        stock::{self, QuantityEdit},
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Stable identity of an item row. Never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// Search box state of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSearch {
    pub query: String,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub id: RowId,
    pub entry: Option<CartEntry>,
}

/// Where the draft's items came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOrigin {
    Manual,
    /// Seeded from the shopping cart. The first warehouse change still clears
    /// the rows but does not warn.
    ExternalCart { first_change_pending: bool },
}

/// Result of [`ItemSelectionController::change_warehouse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarehouseChange {
    pub discarded: usize,
    /// Whether the user should be told the item list was reset.
    pub warn: bool,
}

impl WarehouseChange {
    fn unchanged() -> Self {
        Self {
            discarded: 0,
            warn: false,
        }
    }
}

/// Row-by-row item picker of a borrow-request draft.
///
/// Each row holds at most one catalog item and no item can be picked in two
/// rows. Rows are linked to the external [`RequestCart`] by item id: quantity
/// edits and removals are mirrored into it.
#[derive(Debug, Clone)]
pub struct ItemSelectionController {
    rows: Vec<ItemRow>,
    search: HashMap<RowId, RowSearch>,
    next_row: u64,
    warehouse: Option<WarehouseId>,
    catalog: Vec<CatalogItem>,
    origin: DraftOrigin,
    events: Option<EventSender>,
}

impl Default for ItemSelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemSelectionController {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            search: HashMap::new(),
            next_row: 0,
            warehouse: None,
            catalog: Vec::new(),
            origin: DraftOrigin::Manual,
            events: None,
        }
    }

    /// Seeds one row per cart entry, keeping the cart's warehouse.
    ///
    /// Snapshots are refreshed from `catalog` when it has the item; quantities
    /// are kept as-is and flagged later if they no longer fit.
    pub fn seed_from_cart(cart: &RequestCart, catalog: Vec<CatalogItem>) -> Self {
        let mut controller = Self::new();
        if cart.is_empty() {
            return controller;
        }

        controller.warehouse = cart.warehouse().cloned();
        controller.origin = DraftOrigin::ExternalCart {
            first_change_pending: true,
        };
        for entry in cart.entries() {
            let mut entry = entry.clone();
            if let Some(fresh) = catalog.iter().find(|c| c.id == entry.item.id) {
                entry.item = fresh.clone();
            }
            let id = controller.allocate_row();
            controller.rows.push(ItemRow {
                id,
                entry: Some(entry),
            });
        }
        controller.catalog = catalog;
        info!(rows = controller.rows.len(), "Seeded draft from cart");
        controller
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn allocate_row(&mut self) -> RowId {
        let id = RowId(self.next_row);
        self.next_row += 1;
        id
    }

    fn row_index(&self, row: RowId) -> Result<usize, ServiceError> {
        self.rows
            .iter()
            .position(|r| r.id == row)
            .ok_or_else(|| ServiceError::NotFound(format!("Item {}", row)))
    }

    pub fn origin(&self) -> DraftOrigin {
        self.origin
    }

    pub fn warehouse(&self) -> Option<&WarehouseId> {
        self.warehouse.as_ref()
    }

    pub fn catalog(&self) -> &[CatalogItem] {
        &self.catalog
    }

    pub fn rows(&self) -> &[ItemRow] {
        &self.rows
    }

    pub fn row(&self, row: RowId) -> Option<&ItemRow> {
        self.rows.iter().find(|r| r.id == row)
    }

    pub fn search(&self, row: RowId) -> Option<&RowSearch> {
        self.search.get(&row)
    }

    /// Entries of every row that has an item picked.
    pub fn entries(&self) -> impl Iterator<Item = &CartEntry> {
        self.rows.iter().filter_map(|r| r.entry.as_ref())
    }

    pub fn add_row(&mut self) -> RowId {
        let id = self.allocate_row();
        self.rows.push(ItemRow { id, entry: None });
        id
    }

    /// Updates the search text of `row` and opens its option list.
    pub fn set_query(&mut self, row: RowId, query: impl Into<String>) -> Result<(), ServiceError> {
        self.row_index(row)?;
        let search = self.search.entry(row).or_default();
        search.query = query.into();
        search.open = true;
        Ok(())
    }

    fn picked_elsewhere(&self, row: RowId, item_id: &ItemId) -> bool {
        self.rows
            .iter()
            .any(|r| r.id != row && r.entry.as_ref().is_some_and(|e| e.item_id() == item_id))
    }

    /// Catalog items `row` may pick: matching its query and not already
    /// picked by another row.
    pub fn options(&self, row: RowId) -> Vec<&CatalogItem> {
        let query = self.search.get(&row).map(|s| s.query.as_str()).unwrap_or("");
        self.catalog
            .iter()
            .filter(|item| item.matches(query))
            .filter(|item| !self.picked_elsewhere(row, &item.id))
            .collect()
    }

    /// Picks `item_id` for `row` with quantity 1.
    ///
    /// Re-picking the row's current item keeps it as it is. Replacing a
    /// different item also drops that item's linked cart entry.
    ///
    /// # Errors
    ///
    /// * `NotFound` - unknown row, or the item is not in this warehouse's catalog
    /// * `ValidationError` - the item is already picked in another row
    /// * `InsufficientStock` - nothing is available
    pub fn select(
        &mut self,
        row: RowId,
        item_id: &ItemId,
        cart: &mut RequestCart,
    ) -> Result<&CartEntry, ServiceError> {
        let index = self.row_index(row)?;
        let unchanged = self.rows[index]
            .entry
            .as_ref()
            .is_some_and(|e| e.item_id() == item_id);
        if !unchanged {
            self.replace_pick(index, item_id, cart)?;
        }
        self.search.remove(&row);
        self.rows[index]
            .entry
            .as_ref()
            .ok_or_else(|| ServiceError::NotFound(format!("Item of {}", row)))
    }

    fn replace_pick(
        &mut self,
        index: usize,
        item_id: &ItemId,
        cart: &mut RequestCart,
    ) -> Result<(), ServiceError> {
        let row = self.rows[index].id;
        let item = self
            .catalog
            .iter()
            .find(|c| &c.id == item_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Catalog item {}", item_id)))?;

        if self.picked_elsewhere(row, item_id) {
            return Err(ServiceError::ValidationError(format!(
                "{} is already selected in another row",
                item.name
            )));
        }
        if !stock::validate(item, 1) {
            return Err(ServiceError::InsufficientStock(format!(
                "{} is out of stock",
                item.name
            )));
        }

        let entry = CartEntry::from_item(item);
        debug!(%row, item_id = %item_id, "Item selected");
        if let Some(replaced) = self.rows[index].entry.replace(entry) {
            if cart.remove(replaced.item_id()).is_some() {
                debug!(%row, item_id = %replaced.item_id(), "Replaced item dropped from cart");
                self.emit(Event::CartItemRemoved(replaced.item_id().clone()));
            }
        }
        self.emit(Event::DraftItemSelected {
            item_id: item_id.clone(),
            quantity: 1,
        });
        Ok(())
    }

    /// Routes a raw quantity through the stock clamp and mirrors it into the
    /// linked cart entry, if there is one.
    pub fn set_quantity(
        &mut self,
        row: RowId,
        raw_quantity: i64,
        cart: &mut RequestCart,
    ) -> Result<QuantityEdit, ServiceError> {
        let index = self.row_index(row)?;
        let entry = self.rows[index]
            .entry
            .as_mut()
            .ok_or_else(|| ServiceError::ValidationError("Select an item first".into()))?;

        let edit = QuantityEdit::evaluate(&entry.item, raw_quantity);
        entry.quantity = edit.quantity();
        if edit.was_clamped() {
            warn!(%row, requested = raw_quantity, applied = edit.quantity(), "Quantity clamped");
        }
        if cart.contains(entry.item_id()) {
            cart.set_quantity(entry.item_id(), i64::from(edit.quantity()))?;
        }
        Ok(edit)
    }

    /// Removes `row` and the cart entry linked to its item.
    pub fn remove_row(
        &mut self,
        row: RowId,
        cart: &mut RequestCart,
    ) -> Result<Option<CartEntry>, ServiceError> {
        let index = self.row_index(row)?;
        let removed = self.rows.remove(index);
        self.search.remove(&row);

        if let Some(entry) = &removed.entry {
            if cart.remove(entry.item_id()).is_some() {
                self.emit(Event::CartItemRemoved(entry.item_id().clone()));
            }
        }
        Ok(removed.entry)
    }

    /// Switches the draft to another warehouse.
    ///
    /// The catalog is warehouse-scoped, so every row and its linked cart entry
    /// is dropped. The user is warned unless this is the first change of a
    /// draft seeded from the cart. Setting the first warehouse of an empty
    /// draft, or re-selecting the current one, changes nothing.
    pub fn change_warehouse(
        &mut self,
        warehouse: WarehouseId,
        catalog: Vec<CatalogItem>,
        cart: &mut RequestCart,
    ) -> WarehouseChange {
        if self.warehouse.as_ref() == Some(&warehouse) {
            return WarehouseChange::unchanged();
        }
        if self.warehouse.is_none() {
            self.warehouse = Some(warehouse);
            self.catalog = catalog;
            return WarehouseChange::unchanged();
        }

        let discarded = self.rows.iter().filter(|r| r.entry.is_some()).count();
        for entry in self.rows.iter().filter_map(|r| r.entry.as_ref()) {
            cart.remove(entry.item_id());
        }
        self.rows.clear();
        self.search.clear();

        let warn = match self.origin {
            DraftOrigin::ExternalCart {
                first_change_pending: true,
            } => {
                self.origin = DraftOrigin::ExternalCart {
                    first_change_pending: false,
                };
                false
            }
            _ => true,
        };

        info!(
            from = ?self.warehouse,
            to = %warehouse,
            discarded,
            warn,
            "Draft warehouse changed; item rows reset"
        );
        self.emit(Event::DraftItemsReset {
            warehouse_id: warehouse.clone(),
            discarded,
            warned: warn,
        });
        self.warehouse = Some(warehouse);
        self.catalog = catalog;
        WarehouseChange { discarded, warn }
    }

    /// Replaces the catalog snapshot and returns rows whose quantity now
    /// exceeds availability. Quantities are left alone.
    pub fn refresh_catalog(&mut self, catalog: Vec<CatalogItem>) -> Vec<RowId> {
        for entry in self.rows.iter_mut().filter_map(|r| r.entry.as_mut()) {
            if let Some(fresh) = catalog.iter().find(|c| c.id == entry.item.id) {
                entry.item = fresh.clone();
            }
        }
        self.catalog = catalog;
        let flagged = self.flagged_rows();
        if !flagged.is_empty() {
            warn!(count = flagged.len(), "Rows exceed refreshed availability");
        }
        flagged
    }

    pub fn flagged_rows(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|r| r.entry.as_ref().is_some_and(CartEntry::exceeds_availability))
            .map(|r| r.id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.search.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn item(id: &str, warehouse: &str, available: u32) -> CatalogItem {
        CatalogItem {
            id: ItemId::from(id),
            name: format!("Item {}", id),
            description: None,
            sku: Some(format!("SKU-{}", id)),
            unit: Some("ea".into()),
            unit_cost: None,
            available_quantity: available,
            warehouse_id: WarehouseId::from(warehouse),
        }
    }

    fn manual(catalog: Vec<CatalogItem>) -> ItemSelectionController {
        let mut controller = ItemSelectionController::new();
        let change =
            controller.change_warehouse(WarehouseId::from("W1"), catalog, &mut RequestCart::new());
        assert_eq!(change, WarehouseChange::unchanged());
        controller
    }

    #[test]
    fn duplicate_pick_across_rows_is_rejected() {
        let mut controller = manual(vec![item("A", "W1", 5), item("B", "W1", 5)]);
        let first = controller.add_row();
        let second = controller.add_row();
        controller.select(first, &ItemId::from("A"), &mut RequestCart::new()).unwrap();

        assert_matches!(
            controller.select(second, &ItemId::from("A"), &mut RequestCart::new()),
            Err(ServiceError::ValidationError(_))
        );
        let options: Vec<_> = controller.options(second).iter().map(|i| i.id.clone()).collect();
        assert_eq!(options, vec![ItemId::from("B")]);
        // A row may re-pick its own item.
        assert!(controller.select(first, &ItemId::from("A"), &mut RequestCart::new()).is_ok());
    }

    #[test]
    fn options_follow_row_query() {
        let mut controller = manual(vec![item("A", "W1", 5), item("B", "W1", 5)]);
        let row = controller.add_row();
        controller.set_query(row, "sku-b").unwrap();
        assert!(controller.search(row).unwrap().open);
        assert_eq!(controller.options(row).len(), 1);

        controller.select(row, &ItemId::from("B"), &mut RequestCart::new()).unwrap();
        assert!(controller.search(row).is_none());
    }

    #[test]
    fn quantity_is_clamped_and_mirrored_into_cart() {
        let a = item("A", "W1", 5);
        let mut cart = RequestCart::new();
        cart.add_with_quantity(&a, 3).unwrap();

        let mut controller = ItemSelectionController::seed_from_cart(&cart, vec![a]);
        let row = controller.rows()[0].id;
        let edit = controller.set_quantity(row, 10, &mut cart).unwrap();

        assert_eq!(edit.quantity(), 5);
        assert_eq!(controller.row(row).unwrap().entry.as_ref().unwrap().quantity, 5);
        assert_eq!(cart.get(&ItemId::from("A")).unwrap().quantity, 5);
    }

    #[test]
    fn removing_row_drops_linked_cart_entry() {
        let mut cart = RequestCart::new();
        cart.add(&item("A", "W1", 5)).unwrap();
        cart.add(&item("B", "W1", 5)).unwrap();
        let mut controller = ItemSelectionController::seed_from_cart(&cart, Vec::new());

        let row = controller.rows()[0].id;
        let removed = controller.remove_row(row, &mut cart).unwrap();
        assert_eq!(removed.unwrap().item_id(), &ItemId::from("A"));
        assert!(!cart.contains(&ItemId::from("A")));
        assert!(cart.contains(&ItemId::from("B")));
        assert!(controller.row(row).is_none());
    }

    #[test]
    fn row_ids_survive_removal() {
        let mut controller = manual(vec![item("A", "W1", 5), item("B", "W1", 5)]);
        let first = controller.add_row();
        let second = controller.add_row();
        controller.set_query(second, "B").unwrap();
        controller.remove_row(first, &mut RequestCart::new()).unwrap();

        assert_eq!(controller.search(second).unwrap().query, "B");
        let third = controller.add_row();
        assert_ne!(third, first);
    }

    #[test]
    fn refresh_flags_rows_without_altering() {
        let mut controller = manual(vec![item("A", "W1", 5)]);
        let row = controller.add_row();
        controller.select(row, &ItemId::from("A"), &mut RequestCart::new()).unwrap();
        controller.set_quantity(row, 4, &mut RequestCart::new()).unwrap();

        let flagged = controller.refresh_catalog(vec![item("A", "W1", 2)]);
        assert_eq!(flagged, vec![row]);
        assert_eq!(controller.row(row).unwrap().entry.as_ref().unwrap().quantity, 4);
    }

    #[test]
    fn manual_draft_warns_on_every_warehouse_change() {
        let mut controller = manual(vec![item("A", "W1", 5)]);
        let row = controller.add_row();
        controller.select(row, &ItemId::from("A"), &mut RequestCart::new()).unwrap();

        let change = controller.change_warehouse(
            WarehouseId::from("W2"),
            vec![item("C", "W2", 1)],
            &mut RequestCart::new(),
        );
        assert_eq!(
            change,
            WarehouseChange {
                discarded: 1,
                warn: true
            }
        );
        assert!(controller.is_empty());
        assert_eq!(controller.catalog().len(), 1);
    }

    #[tokio::test]
    async fn seeded_draft_suppresses_first_warning_only() {
        let mut cart = RequestCart::new();
        cart.add(&item("A", "W1", 5)).unwrap();
        cart.add(&item("B", "W1", 5)).unwrap();

        let (events, mut rx) = EventSender::channel(8);
        let mut controller =
            ItemSelectionController::seed_from_cart(&cart, Vec::new()).with_events(events);
        assert_eq!(controller.warehouse(), Some(&WarehouseId::from("W1")));

        let first = controller.change_warehouse(WarehouseId::from("W2"), Vec::new(), &mut cart);
        assert_eq!(
            first,
            WarehouseChange {
                discarded: 2,
                warn: false
            }
        );
        assert!(controller.is_empty());
        assert!(cart.is_empty());

        let second = controller.change_warehouse(WarehouseId::from("W3"), Vec::new(), &mut cart);
        assert!(second.warn);

        assert_matches!(
            rx.recv().await,
            Some(Event::DraftItemsReset { warned: false, .. })
        );
        assert_matches!(
            rx.recv().await,
            Some(Event::DraftItemsReset { warned: true, .. })
        );
    }
}
