use super::{ItemId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of an inventory item as fetched for one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    pub available_quantity: u32,
    pub warehouse_id: WarehouseId,
}

impl CatalogItem {
    /// Case-insensitive match against name, sku and description.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self
                .sku
                .as_deref()
                .is_some_and(|sku| sku.to_lowercase().contains(&query))
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    }
}

/// One requested line: an item snapshot plus the quantity asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub item: CatalogItem,
    pub quantity: u32,
    pub warehouse_id: Option<WarehouseId>,
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
}

impl CartEntry {
    /// New entry with quantity 1 and unit/cost copied from the snapshot.
    pub fn from_item(item: &CatalogItem) -> Self {
        Self {
            item: item.clone(),
            quantity: 1,
            warehouse_id: Some(item.warehouse_id.clone()),
            unit: item.unit.clone(),
            unit_cost: item.unit_cost,
        }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item.id
    }

    pub fn line_cost(&self) -> Option<Decimal> {
        self.unit_cost.map(|cost| cost * Decimal::from(self.quantity))
    }

    /// Quantity is above what the (possibly refreshed) snapshot says is available.
    pub fn exceeds_availability(&self) -> bool {
        self.quantity > self.item.available_quantity
    }
}
