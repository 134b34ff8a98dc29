use super::{ItemId, UserId, WarehouseId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Free-form metadata entered on a borrow-request draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDetails {
    pub notes: Option<String>,
    pub address: Option<String>,
    pub google_maps_url: Option<String>,
    pub zip_code: Option<String>,
    pub return_date: Option<NaiveDate>,
}

impl DraftDetails {
    /// Optional text fields count as absent when blank.
    pub fn google_maps_url(&self) -> Option<&str> {
        non_blank(self.google_maps_url.as_deref())
    }

    pub fn zip_code(&self) -> Option<&str> {
        non_blank(self.zip_code.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItemLine {
    pub item_id: ItemId,
    pub quantity_requested: u32,
}

/// Body of the borrow-request creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequestPayload {
    pub requester_id: UserId,
    pub warehouse_id: WarehouseId,
    pub company_id: String,
    pub customer_id: String,
    pub department_id: Option<String>,
    pub project_id: String,
    pub work_order_id: String,
    pub expected_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub google_maps_url: Option<String>,
    pub zip_code: Option<String>,
    pub items: Vec<RequestItemLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequestReceipt {
    pub id: String,
    #[serde(default)]
    pub request_number: Option<String>,
}
