use crate::{
    domain::{CartEntry, CatalogItem, ItemId, WarehouseId},
    errors::ServiceError,
    services::stock::{self, QuantityEdit},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// In-memory shopping cart of requested items.
///
/// Holds at most one [`CartEntry`] per catalog item and keeps every entry's
/// quantity within `1..=available` at the time it was set. Entries keep their
/// warehouse affinity so a borrow-request draft can be seeded from the cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCart {
    entries: Vec<CartEntry>,
}

impl RequestCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.position(item_id).is_some()
    }

    pub fn get(&self, item_id: &ItemId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.item_id() == item_id)
    }

    fn position(&self, item_id: &ItemId) -> Option<usize> {
        self.entries.iter().position(|e| e.item_id() == item_id)
    }

    /// Warehouse carried by the cart, taken from its first entry.
    pub fn warehouse(&self) -> Option<&WarehouseId> {
        self.entries.iter().find_map(|e| e.warehouse_id.as_ref())
    }

    /// Adds `item` with quantity 1.
    ///
    /// # Errors
    ///
    /// * `ValidationError` - the item is already in the cart
    /// * `InsufficientStock` - nothing is available to request
    pub fn add(&mut self, item: &CatalogItem) -> Result<&CartEntry, ServiceError> {
        if self.contains(&item.id) {
            return Err(ServiceError::ValidationError(format!(
                "{} is already in the cart",
                item.name
            )));
        }
        if !stock::validate(item, 1) {
            return Err(ServiceError::InsufficientStock(format!(
                "{} is out of stock",
                item.name
            )));
        }

        self.entries.push(CartEntry::from_item(item));
        info!(item_id = %item.id, "Added item to cart");
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Adds `item` and immediately applies a quantity, clamped to stock.
    pub fn add_with_quantity(
        &mut self,
        item: &CatalogItem,
        raw_quantity: i64,
    ) -> Result<QuantityEdit, ServiceError> {
        self.add(item)?;
        self.set_quantity(&item.id, raw_quantity)
    }

    /// Routes a quantity edit through [`stock::clamp`].
    ///
    /// Out-of-range values are not an error: the clamped value is stored and
    /// the returned [`QuantityEdit`] tells the caller it was adjusted.
    pub fn set_quantity(
        &mut self,
        item_id: &ItemId,
        raw_quantity: i64,
    ) -> Result<QuantityEdit, ServiceError> {
        let index = self
            .position(item_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {}", item_id)))?;

        let entry = &mut self.entries[index];
        let edit = QuantityEdit::evaluate(&entry.item, raw_quantity);
        if edit.was_clamped() {
            warn!(
                item_id = %item_id,
                requested = raw_quantity,
                applied = edit.quantity(),
                "Quantity clamped to available stock"
            );
        }
        entry.quantity = edit.quantity();
        Ok(edit)
    }

    pub fn remove(&mut self, item_id: &ItemId) -> Option<CartEntry> {
        let index = self.position(item_id)?;
        debug!(item_id = %item_id, "Removed item from cart");
        Some(self.entries.remove(index))
    }

    /// Replaces item snapshots with fresher ones from `catalog`.
    ///
    /// Quantities are never altered here. Returns the ids of entries whose
    /// quantity now exceeds availability so they can be flagged to the user.
    pub fn refresh_availability(&mut self, catalog: &[CatalogItem]) -> Vec<ItemId> {
        let mut flagged = Vec::new();
        for entry in &mut self.entries {
            if let Some(fresh) = catalog.iter().find(|c| c.id == entry.item.id) {
                entry.item = fresh.clone();
            }
            if entry.exceeds_availability() {
                flagged.push(entry.item.id.clone());
            }
        }
        if !flagged.is_empty() {
            warn!(count = flagged.len(), "Cart entries exceed refreshed availability");
        }
        flagged
    }

    pub fn over_allocated(&self) -> Vec<&CartEntry> {
        self.entries
            .iter()
            .filter(|e| e.exceeds_availability())
            .collect()
    }

    pub fn total_quantity(&self) -> u32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.entries.iter().filter_map(CartEntry::line_cost).sum()
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            info!(count = self.entries.len(), "Cleared cart");
        }
        self.entries.clear();
    }
}
