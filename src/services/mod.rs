// Leaf rules
pub mod cart;
pub mod stock;

// Borrow-request drafting
pub mod draft;
pub mod hierarchy;
pub mod item_selection;
pub mod submission;

// Peer-to-peer transfers
pub mod transfers;

// Service factory for dependency injection
pub mod factory;
