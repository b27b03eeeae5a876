//! Data models for both sides of the sync.
//!
//! Upwork data arrives as loosely typed JSON and tabular reports and is
//! lifted into [`SourceTeam`] / [`SourceTransaction`]. Wave entities are
//! strongly typed, with newtype ID wrappers to keep them apart.

mod business;
mod customer;
mod ids;
mod invoice;
mod mutation;
mod payment;
mod report;
mod source;

pub use business::{Account, Business, Product};
pub use chrono::NaiveDate;
pub use customer::{Customer, CustomerCreateInput, CustomerPatchInput};
pub use ids::{AccountId, BusinessId, CustomerId, InvoiceId, PaymentId, ProductId};
pub use invoice::{
    DEFAULT_CURRENCY, Invoice, InvoiceCreateInput, InvoiceCreateStatus, InvoiceItem,
    InvoiceItemInput, InvoiceQuery,
};
pub use mutation::{InputError, MutationOutcome};
pub use payment::{Payment, PaymentInput, PaymentMethod};
pub use report::{Record, ReportCell, ReportColumn, ReportResponse, ReportRow, ReportTable, flatten};
pub use source::{REPORT_DATE_FORMAT, SourceTeam, SourceTransaction};
