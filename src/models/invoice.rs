//! Wave invoice model, creation input and lookup query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BusinessId, CustomerId, InvoiceId, ProductId};

/// Currency used when the configuration does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// An invoice as stored in Wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Wave identifier.
    pub id: InvoiceId,
    /// Invoice number; set to the Upwork transaction reference.
    pub invoice_number: String,
    /// Billed customer.
    pub customer_id: CustomerId,
    /// Invoice title.
    pub title: Option<String>,
    /// ISO currency code.
    pub currency: String,
    /// Wave status string (`SAVED`, `PAID`, ...).
    pub status: String,
    /// Issue date.
    pub invoice_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Line items.
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    /// Footer memo.
    pub memo: Option<String>,
}

/// A line item on a stored invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    /// Product billed.
    pub product_id: ProductId,
    /// Line description.
    pub description: Option<String>,
    /// Quantity (hours for hourly work).
    pub quantity: f64,
    /// Price per unit.
    pub unit_price: f64,
}

/// Status an invoice is created with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceCreateStatus {
    /// Editable draft.
    Draft,
    /// Approved and ready to be paid.
    #[default]
    Saved,
}

/// Fields for `invoiceCreate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCreateInput {
    /// Owning business.
    pub business_id: BusinessId,
    /// Billed customer.
    pub customer_id: CustomerId,
    /// Initial status.
    pub status: InvoiceCreateStatus,
    /// ISO currency code.
    pub currency: String,
    /// Issue date.
    pub invoice_date: NaiveDate,
    /// Due date.
    pub due_date: NaiveDate,
    /// Invoice title.
    pub title: String,
    /// Invoice number.
    pub invoice_number: String,
    /// Line items.
    pub items: Vec<InvoiceItemInput>,
    /// Footer memo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// A line item in [`InvoiceCreateInput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemInput {
    /// Product billed.
    pub product_id: ProductId,
    /// Line description.
    pub description: String,
    /// Quantity.
    pub quantity: f64,
    /// Price per unit.
    pub unit_price: f64,
}

/// Filter for listing a business's invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    /// Earliest invoice date (inclusive).
    pub from: Option<NaiveDate>,
    /// Latest invoice date (inclusive).
    pub to: Option<NaiveDate>,
    /// Invoice number to match.
    pub invoice_number: Option<String>,
}

impl InvoiceQuery {
    /// Query for the invoice carrying `number`.
    #[inline]
    #[must_use]
    pub fn by_number<T: Into<String>>(number: T) -> Self {
        Self {
            invoice_number: Some(number.into()),
            ..Self::default()
        }
    }

    /// Restricts the query to a date range (inclusive).
    #[inline]
    #[must_use]
    pub const fn date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Returns `true` if `invoice` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.from.is_none_or(|from| invoice.invoice_date >= from)
            && self.to.is_none_or(|to| invoice.invoice_date <= to)
            && self
                .invoice_number
                .as_ref()
                .is_none_or(|number| invoice.invoice_number == *number)
    }
}
