//! Reconciliation of Upwork records against Wave.
//!
//! [`customers`] runs once per sync and brings Wave customers in line with
//! Upwork teams. [`transactions`] runs per date window and creates the
//! missing invoices and payments.

pub mod customers;
pub mod transactions;

use serde_json::{Map, Value};

pub use customers::{CustomerDirectory, CustomerReconciler, CustomerReport, team_to_customer};
pub use transactions::{
    Mappings, ReconcileSettings, TransactionOutcome, TransactionReconciler, TransactionReport,
};

/// Key under which source records are embedded in Wave notes and memos.
pub const SOURCE_KEY: &str = "upwork";

/// Renders `raw` as pretty JSON nested under [`SOURCE_KEY`].
#[must_use]
pub fn source_memo(raw: Value) -> String {
    let mut object = Map::new();
    let _old = object.insert(SOURCE_KEY.to_owned(), raw);
    format!("{:#}", Value::Object(object))
}
