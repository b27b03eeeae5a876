//! Wave business, product and account models.

use serde::{Deserialize, Serialize};

use super::{AccountId, BusinessId, ProductId};

/// A Wave business (the bookkeeping tenant being synced).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    /// Wave identifier.
    pub id: BusinessId,
    /// Display name.
    pub name: String,
    /// Default currency code of the business.
    #[serde(default)]
    pub currency: Option<String>,
}

/// A product or service that can be placed on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Wave identifier.
    pub id: ProductId,
    /// Product name.
    pub name: String,
}

/// A ledger account payments can be deposited into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Wave identifier.
    pub id: AccountId,
    /// Account name.
    pub name: String,
    /// Legacy numeric identifier required by the REST payment endpoint.
    #[serde(default)]
    pub classic_id: Option<String>,
}
