//! Collaborator interfaces for the two platforms the sync talks to.
//!
//! The reconcilers only see these traits. [`crate::client`] provides the
//! HTTP-backed implementations and [`memory`] provides in-memory ones for
//! tests and dry runs. All calls are blocking.

pub mod memory;

use serde_json::Value;

use crate::error::Result;
use crate::models::{
    Account, Business, BusinessId, Customer, CustomerCreateInput, CustomerPatchInput, Invoice,
    InvoiceCreateInput, InvoiceId, InvoiceQuery, MutationOutcome, NaiveDate, Payment,
    PaymentInput, Product, ProductId, ReportResponse,
};

pub use memory::{InMemoryDestination, InMemorySource};

/// Read-only access to Upwork.
pub trait SourcePlatform: core::fmt::Debug {
    /// Returns the raw team records the authenticated user belongs to.
    ///
    /// Returns `Ok(None)` if the response did not contain a team list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn teams(&self) -> Result<Option<Vec<Value>>>;

    /// Runs the financial report for `entity_ref` over `[from, to]`,
    /// selecting the columns in `fields`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a report.
    fn report_transactions(
        &self,
        entity_ref: &str,
        from: NaiveDate,
        to: NaiveDate,
        fields: &str,
    ) -> Result<ReportResponse>;
}

/// Read/write access to Wave.
pub trait DestinationPlatform: core::fmt::Debug {
    /// Looks up a business by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn business(&self, id: &BusinessId) -> Result<Option<Business>>;

    /// Lists all customers of a business.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn customers(&self, business_id: &BusinessId) -> Result<Vec<Customer>>;

    /// Creates a customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. Validation failures are
    /// reported through the [`MutationOutcome`].
    fn create_customer(&self, input: &CustomerCreateInput) -> Result<MutationOutcome<Customer>>;

    /// Patches an existing customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. Validation failures are
    /// reported through the [`MutationOutcome`].
    fn patch_customer(&self, input: &CustomerPatchInput) -> Result<MutationOutcome<Customer>>;

    /// Lists the invoices of a business matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn invoices(&self, business_id: &BusinessId, query: &InvoiceQuery) -> Result<Vec<Invoice>>;

    /// Fetches a single invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn invoice(&self, business_id: &BusinessId, invoice_id: &InvoiceId)
    -> Result<Option<Invoice>>;

    /// Creates an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. Validation failures are
    /// reported through the [`MutationOutcome`].
    fn create_invoice(&self, input: &InvoiceCreateInput) -> Result<MutationOutcome<Invoice>>;

    /// Lists the ledger accounts of a business.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn accounts(&self, business_id: &BusinessId) -> Result<Vec<Account>>;

    /// Lists the products of a business.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn products(&self, business_id: &BusinessId) -> Result<Vec<Product>>;

    /// Fetches a single product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn product(&self, business_id: &BusinessId, product_id: &ProductId)
    -> Result<Option<Product>>;

    /// Records a payment against an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Wave rejects the payment.
    fn create_payment(&self, input: &PaymentInput) -> Result<Payment>;
}
