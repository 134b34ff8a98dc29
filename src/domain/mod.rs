//! Domain types shared by the cart, hierarchy, transfer and submission services.

pub mod catalog;
pub mod hierarchy;
pub mod request;
pub mod transfer;

pub use catalog::{CartEntry, CatalogItem};
pub use hierarchy::{
    Company, Customer, HierarchyChain, HierarchyLevel, HierarchyNode, HierarchyScope, Project,
    WorkOrder,
};
pub use request::{BorrowRequestPayload, BorrowRequestReceipt, DraftDetails, RequestItemLine};
pub use transfer::{
    AcceptTransfer, Party, TransferDetail, TransferDirection, TransferItem, TransferLine,
    TransferStatus, TransferSummary,
};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Catalog item identity (one per SKU).
    ItemId
);
string_id!(WarehouseId);
string_id!(
    /// Backend user identity of a sender, recipient or requester.
    UserId
);
string_id!(
    /// Transfer request number, e.g. `TR-100`.
    TransferId
);
