//! Stock bounds for requested quantities.
//!
//! Pure functions: nothing here fails or mutates. Invalid input is clamped or
//! reported through a boolean/outcome so the caller can block submission.

use crate::domain::CatalogItem;

/// `true` iff `1 <= requested <= item.available_quantity`.
pub fn validate(item: &CatalogItem, requested: u32) -> bool {
    requested >= 1 && requested <= item.available_quantity
}

/// `max(1, min(raw, available))`.
///
/// Raw input is signed because it comes straight from a text field; negative
/// and zero values clamp up to 1. When nothing is available the result is
/// still 1, which [`validate`] then rejects.
pub fn clamp(item: &CatalogItem, raw: i64) -> u32 {
    let available = i64::from(item.available_quantity);
    // Bounded to [1, u32::MAX] so the conversion cannot fail.
    u32::try_from(raw.min(available).max(1)).unwrap_or(1)
}

/// Result of routing a quantity edit through [`clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityEdit {
    /// The raw value was in range and applied as-is.
    Applied(u32),
    /// The raw value was out of range; `applied` is what was stored instead.
    Clamped { requested: i64, applied: u32 },
}

impl QuantityEdit {
    pub fn evaluate(item: &CatalogItem, raw: i64) -> Self {
        let applied = clamp(item, raw);
        if i64::from(applied) == raw {
            QuantityEdit::Applied(applied)
        } else {
            QuantityEdit::Clamped {
                requested: raw,
                applied,
            }
        }
    }

    pub fn quantity(&self) -> u32 {
        match *self {
            QuantityEdit::Applied(q) => q,
            QuantityEdit::Clamped { applied, .. } => applied,
        }
    }

    pub fn was_clamped(&self) -> bool {
        matches!(self, QuantityEdit::Clamped { .. })
    }
}
