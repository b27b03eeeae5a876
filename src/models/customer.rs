//! Wave customer model and mutation inputs.

use serde::{Deserialize, Serialize};

use super::{BusinessId, CustomerId};

/// A billing entity in Wave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Wave-assigned identifier; blank until the customer is created.
    #[serde(default)]
    pub id: CustomerId,
    /// Account number shown in Wave, holding the Upwork team reference.
    pub display_id: Option<String>,
    /// Customer (company) name.
    pub name: String,
    /// Contact first name.
    pub first_name: Option<String>,
    /// Contact last name.
    pub last_name: Option<String>,
    /// Free-text notes carrying a JSON copy of the source record.
    pub internal_notes: Option<String>,
}

impl Customer {
    /// Returns `true` once Wave has assigned an identifier.
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_blank()
    }

    /// Input for creating this customer under `business_id`.
    #[must_use]
    pub fn create_input(&self, business_id: &BusinessId) -> CustomerCreateInput {
        CustomerCreateInput {
            business_id: business_id.clone(),
            name: self.name.clone(),
            display_id: self.display_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            internal_notes: self.internal_notes.clone(),
        }
    }

    /// Input for patching this customer in place.
    #[must_use]
    pub fn patch_input(&self) -> CustomerPatchInput {
        CustomerPatchInput {
            id: self.id.clone(),
            name: Some(self.name.clone()),
            display_id: self.display_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            internal_notes: self.internal_notes.clone(),
        }
    }
}

/// Fields for `customerCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreateInput {
    /// Owning business.
    pub business_id: BusinessId,
    /// Customer name.
    pub name: String,
    /// Account number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    /// Contact first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Contact last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Internal notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<String>,
}

/// Fields for `customerPatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatchInput {
    /// Customer to patch.
    pub id: CustomerId,
    /// Customer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Account number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    /// Contact first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Contact last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Internal notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<String>,
}
