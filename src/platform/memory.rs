//! In-memory platform backends.
//!
//! [`InMemorySource`] and [`InMemoryDestination`] implement the platform
//! traits over plain vectors behind a mutex. They back the reconciler
//! tests and make dry runs possible without network access.
//!
//! # Example
//!
//! ```rust
//! use longboard_rs::models::{Business, BusinessId};
//! use longboard_rs::platform::{DestinationPlatform, InMemoryDestination};
//!
//! let wave = InMemoryDestination::new().with_business(Business {
//!     id: BusinessId::from("biz-1"),
//!     name: "Freelance Co".to_owned(),
//!     currency: None,
//! });
//! assert!(wave.business(&BusinessId::from("biz-1")).unwrap().is_some());
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use serde_json::Value;

use super::{DestinationPlatform, SourcePlatform};
use crate::error::{LongboardError, Result};
use crate::models::{
    Account, Business, BusinessId, Customer, CustomerCreateInput, CustomerId, CustomerPatchInput,
    InputError, Invoice, InvoiceCreateInput, InvoiceCreateStatus, InvoiceId, InvoiceItem,
    InvoiceQuery, MutationOutcome, NaiveDate, Payment, PaymentId, PaymentInput, Product,
    ProductId, REPORT_DATE_FORMAT, Record, ReportCell, ReportColumn, ReportResponse, ReportRow,
    ReportTable,
};

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> LongboardError {
    LongboardError::Backend(err.to_string())
}

// ── Source ──────────────────────────────────────────────────────────────

/// In-memory stand-in for Upwork.
///
/// Report queries return the stored rows whose `date` column falls in the
/// requested range, rendered back into the tabular response shape.
#[derive(Debug, Default)]
pub struct InMemorySource {
    /// All state behind a single mutex.
    inner: Mutex<SourceInner>,
}

/// Inner mutable state of [`InMemorySource`].
#[derive(Debug, Default)]
struct SourceInner {
    /// Team records; `None` simulates a response without a team list.
    teams: Option<Vec<Value>>,
    /// Report rows.
    rows: Vec<Record>,
    /// Window start dates whose report request fails.
    failing_windows: HashSet<NaiveDate>,
    /// Every report request made, as `(from, to)`.
    report_calls: Vec<(NaiveDate, NaiveDate)>,
}

impl InMemorySource {
    /// Creates a source with an empty team list and no report rows.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SourceInner {
                teams: Some(Vec::new()),
                ..SourceInner::default()
            }),
        }
    }

    /// Creates a source whose team endpoint returns no list at all.
    #[inline]
    #[must_use]
    pub fn without_teams() -> Self {
        Self::default()
    }

    /// Adds a raw team record.
    #[must_use]
    pub fn with_team(self, team: Value) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.teams.get_or_insert_with(Vec::new).push(team);
        }
        self
    }

    /// Adds a report row.
    #[must_use]
    pub fn with_row(self, row: Record) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.rows.push(row);
        }
        self
    }

    /// Makes the report request for the window starting on `start` fail.
    #[must_use]
    pub fn failing_window(self, start: NaiveDate) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            let _new = inner.failing_windows.insert(start);
        }
        self
    }

    /// Returns every report request made so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn report_calls(&self) -> Result<Vec<(NaiveDate, NaiveDate)>> {
        let inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(inner.report_calls.clone())
    }
}

impl SourcePlatform for InMemorySource {
    fn teams(&self) -> Result<Option<Vec<Value>>> {
        let inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(inner.teams.clone())
    }

    fn report_transactions(
        &self,
        _entity_ref: &str,
        from: NaiveDate,
        to: NaiveDate,
        _fields: &str,
    ) -> Result<ReportResponse> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        inner.report_calls.push((from, to));
        if inner.failing_windows.contains(&from) {
            return Err(LongboardError::Backend(format!(
                "report unavailable for {from}"
            )));
        }
        let rows: Vec<&Record> = inner
            .rows
            .iter()
            .filter(|row| {
                row.get("date")
                    .and_then(|text| NaiveDate::parse_from_str(text, REPORT_DATE_FORMAT).ok())
                    .is_some_and(|date| from <= date && date <= to)
            })
            .collect();
        Ok(render_table(&rows))
    }
}

/// Renders rows back into the tabular response shape.
fn render_table(rows: &[&Record]) -> ReportResponse {
    let labels: Vec<String> = rows
        .iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let table = ReportTable {
        cols: labels
            .iter()
            .map(|label| ReportColumn {
                label: label.clone(),
            })
            .collect(),
        rows: rows
            .iter()
            .map(|row| ReportRow {
                c: labels
                    .iter()
                    .map(|label| {
                        row.get(label).map(|value| ReportCell {
                            v: Value::String(value.clone()),
                        })
                    })
                    .collect(),
            })
            .collect(),
    };
    ReportResponse { table: Some(table) }
}

// ── Destination ─────────────────────────────────────────────────────────

/// A mutation applied to an [`InMemoryDestination`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationLog {
    /// `create_customer` with this display id.
    CreateCustomer(Option<String>),
    /// `patch_customer` on this customer.
    PatchCustomer(CustomerId),
    /// `create_invoice` with this invoice number.
    CreateInvoice(String),
    /// `create_payment` against this invoice.
    CreatePayment(InvoiceId),
}

/// In-memory stand-in for Wave.
///
/// Invoice numbers are unique per business, mirroring Wave's own
/// validation.
#[derive(Debug, Default)]
pub struct InMemoryDestination {
    /// All state behind a single mutex.
    inner: Mutex<DestinationInner>,
}

/// Inner mutable state of [`InMemoryDestination`].
#[derive(Debug, Default)]
struct DestinationInner {
    /// Known businesses.
    businesses: Vec<Business>,
    /// Customers with their owning business.
    customers: Vec<(BusinessId, Customer)>,
    /// Invoices with their owning business.
    invoices: Vec<(BusinessId, Invoice)>,
    /// Accounts with their owning business.
    accounts: Vec<(BusinessId, Account)>,
    /// Products with their owning business.
    products: Vec<(BusinessId, Product)>,
    /// Recorded payments.
    payments: Vec<(Payment, PaymentInput)>,
    /// Mutation history.
    mutations: Vec<MutationLog>,
    /// Display ids whose create/patch is rejected.
    rejected_customers: HashSet<String>,
    /// Invoice numbers whose creation is rejected.
    rejected_invoices: HashSet<String>,
    /// Whether invoice listing fails.
    failing_invoice_lookups: bool,
    /// Counter for generated identifiers.
    next_id: u64,
}

impl DestinationInner {
    /// Generates a fresh identifier with the given prefix.
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Builds the rejection returned for injected validation failures.
fn rejection(field: &str, message: &str) -> Vec<InputError> {
    vec![InputError {
        path: vec!["input".to_owned(), field.to_owned()],
        message: message.to_owned(),
        code: Some("INVALID".to_owned()),
    }]
}

impl InMemoryDestination {
    /// Creates an empty destination.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a seeding closure to the inner state.
    fn seed(self, f: impl FnOnce(&mut DestinationInner)) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            f(&mut inner);
        }
        self
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut DestinationInner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }

    /// Adds a business.
    #[must_use]
    pub fn with_business(self, business: Business) -> Self {
        self.seed(|inner| inner.businesses.push(business))
    }

    /// Adds an existing customer to `business_id`.
    #[must_use]
    pub fn with_customer(self, business_id: &BusinessId, customer: Customer) -> Self {
        let owner = business_id.clone();
        self.seed(|inner| inner.customers.push((owner, customer)))
    }

    /// Adds an existing invoice to `business_id`.
    #[must_use]
    pub fn with_invoice(self, business_id: &BusinessId, invoice: Invoice) -> Self {
        let owner = business_id.clone();
        self.seed(|inner| inner.invoices.push((owner, invoice)))
    }

    /// Adds a ledger account to `business_id`.
    #[must_use]
    pub fn with_account(self, business_id: &BusinessId, account: Account) -> Self {
        let owner = business_id.clone();
        self.seed(|inner| inner.accounts.push((owner, account)))
    }

    /// Adds a product to `business_id`.
    #[must_use]
    pub fn with_product(self, business_id: &BusinessId, product: Product) -> Self {
        let owner = business_id.clone();
        self.seed(|inner| inner.products.push((owner, product)))
    }

    /// Rejects create/patch mutations for the customer with `display_id`.
    #[must_use]
    pub fn rejecting_customer<T: Into<String>>(self, display_id: T) -> Self {
        let display_id = display_id.into();
        self.seed(|inner| {
            let _new = inner.rejected_customers.insert(display_id);
        })
    }

    /// Rejects creation of the invoice numbered `number`.
    #[must_use]
    pub fn rejecting_invoice<T: Into<String>>(self, number: T) -> Self {
        let number = number.into();
        self.seed(|inner| {
            let _new = inner.rejected_invoices.insert(number);
        })
    }

    /// Makes every invoice listing fail.
    #[must_use]
    pub fn failing_invoice_lookups(self) -> Self {
        self.seed(|inner| inner.failing_invoice_lookups = true)
    }

    /// Returns the mutation history.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn mutations(&self) -> Result<Vec<MutationLog>> {
        self.with_lock(|inner| inner.mutations.clone())
    }

    /// Returns all invoices of `business_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn invoices_of(&self, business_id: &BusinessId) -> Result<Vec<Invoice>> {
        self.with_lock(|inner| owned_by(&inner.invoices, business_id))
    }

    /// Returns every recorded payment with the input that created it.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn payments(&self) -> Result<Vec<(Payment, PaymentInput)>> {
        self.with_lock(|inner| inner.payments.clone())
    }
}

/// Clones the items of `rows` owned by `business_id`.
fn owned_by<T: Clone>(rows: &[(BusinessId, T)], business_id: &BusinessId) -> Vec<T> {
    rows.iter()
        .filter(|row| row.0 == *business_id)
        .map(|row| row.1.clone())
        .collect()
}

impl DestinationPlatform for InMemoryDestination {
    fn business(&self, id: &BusinessId) -> Result<Option<Business>> {
        self.with_lock(|inner| inner.businesses.iter().find(|b| b.id == *id).cloned())
    }

    fn customers(&self, business_id: &BusinessId) -> Result<Vec<Customer>> {
        self.with_lock(|inner| owned_by(&inner.customers, business_id))
    }

    fn create_customer(&self, input: &CustomerCreateInput) -> Result<MutationOutcome<Customer>> {
        self.with_lock(|inner| {
            inner
                .mutations
                .push(MutationLog::CreateCustomer(input.display_id.clone()));
            let rejected = input
                .display_id
                .as_ref()
                .is_some_and(|id| inner.rejected_customers.contains(id));
            if rejected || input.name.trim().is_empty() {
                return MutationOutcome::rejected(rejection("name", "customer rejected"));
            }
            let customer = Customer {
                id: CustomerId::new(inner.next_id("cust")),
                display_id: input.display_id.clone(),
                name: input.name.clone(),
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                internal_notes: input.internal_notes.clone(),
            };
            inner
                .customers
                .push((input.business_id.clone(), customer.clone()));
            MutationOutcome::succeeded(customer)
        })
    }

    fn patch_customer(&self, input: &CustomerPatchInput) -> Result<MutationOutcome<Customer>> {
        self.with_lock(|inner| {
            inner
                .mutations
                .push(MutationLog::PatchCustomer(input.id.clone()));
            let rejected = &inner.rejected_customers;
            let Some(customer) = inner
                .customers
                .iter_mut()
                .map(|row| &mut row.1)
                .find(|customer| customer.id == input.id)
            else {
                return MutationOutcome::rejected(rejection("id", "customer not found"));
            };
            if customer
                .display_id
                .as_ref()
                .is_some_and(|id| rejected.contains(id))
            {
                return MutationOutcome::rejected(rejection("id", "customer rejected"));
            }
            if let Some(name) = input.name.as_ref() {
                customer.name.clone_from(name);
            }
            if input.display_id.is_some() {
                customer.display_id.clone_from(&input.display_id);
            }
            if input.first_name.is_some() {
                customer.first_name.clone_from(&input.first_name);
            }
            if input.last_name.is_some() {
                customer.last_name.clone_from(&input.last_name);
            }
            if input.internal_notes.is_some() {
                customer.internal_notes.clone_from(&input.internal_notes);
            }
            MutationOutcome::succeeded(customer.clone())
        })
    }

    fn invoices(&self, business_id: &BusinessId, query: &InvoiceQuery) -> Result<Vec<Invoice>> {
        let failing = self.with_lock(|inner| inner.failing_invoice_lookups)?;
        if failing {
            return Err(LongboardError::Backend("invoice lookup failed".to_owned()));
        }
        self.with_lock(|inner| {
            owned_by(&inner.invoices, business_id)
                .into_iter()
                .filter(|invoice| query.matches(invoice))
                .collect()
        })
    }

    fn invoice(
        &self,
        business_id: &BusinessId,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>> {
        self.with_lock(|inner| {
            owned_by(&inner.invoices, business_id)
                .into_iter()
                .find(|invoice| invoice.id == *invoice_id)
        })
    }

    fn create_invoice(&self, input: &InvoiceCreateInput) -> Result<MutationOutcome<Invoice>> {
        self.with_lock(|inner| {
            inner
                .mutations
                .push(MutationLog::CreateInvoice(input.invoice_number.clone()));
            if inner.rejected_invoices.contains(&input.invoice_number) {
                return MutationOutcome::rejected(rejection("items", "invoice rejected"));
            }
            let duplicate = inner.invoices.iter().any(|row| {
                row.0 == input.business_id && row.1.invoice_number == input.invoice_number
            });
            if duplicate {
                return MutationOutcome::rejected(rejection(
                    "invoiceNumber",
                    "invoice number already in use",
                ));
            }
            let status = match input.status {
                InvoiceCreateStatus::Draft => "DRAFT",
                InvoiceCreateStatus::Saved => "SAVED",
            };
            let invoice = Invoice {
                id: InvoiceId::new(inner.next_id("inv")),
                invoice_number: input.invoice_number.clone(),
                customer_id: input.customer_id.clone(),
                title: Some(input.title.clone()),
                currency: input.currency.clone(),
                status: status.to_owned(),
                invoice_date: input.invoice_date,
                due_date: Some(input.due_date),
                items: input
                    .items
                    .iter()
                    .map(|item| InvoiceItem {
                        product_id: item.product_id.clone(),
                        description: Some(item.description.clone()),
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect(),
                memo: input.memo.clone(),
            };
            inner
                .invoices
                .push((input.business_id.clone(), invoice.clone()));
            MutationOutcome::succeeded(invoice)
        })
    }

    fn accounts(&self, business_id: &BusinessId) -> Result<Vec<Account>> {
        self.with_lock(|inner| owned_by(&inner.accounts, business_id))
    }

    fn products(&self, business_id: &BusinessId) -> Result<Vec<Product>> {
        self.with_lock(|inner| owned_by(&inner.products, business_id))
    }

    fn product(
        &self,
        business_id: &BusinessId,
        product_id: &ProductId,
    ) -> Result<Option<Product>> {
        self.with_lock(|inner| {
            owned_by(&inner.products, business_id)
                .into_iter()
                .find(|product| product.id == *product_id)
        })
    }

    fn create_payment(&self, input: &PaymentInput) -> Result<Payment> {
        self.with_lock(|inner| {
            inner
                .mutations
                .push(MutationLog::CreatePayment(input.invoice_id.clone()));
            let Some(invoice) = inner
                .invoices
                .iter_mut()
                .filter(|row| row.0 == input.business_id)
                .map(|row| &mut row.1)
                .find(|invoice| invoice.id == input.invoice_id)
            else {
                return Err(LongboardError::Api {
                    status: 404,
                    message: format!("invoice {} not found", input.invoice_id),
                });
            };
            "PAID".clone_into(&mut invoice.status);
            let payment = Payment {
                id: PaymentId::new(inner.next_id("pay")),
            };
            inner.payments.push((payment.clone(), input.clone()));
            Ok(payment)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceItemInput, PaymentMethod};

    fn biz() -> BusinessId {
        BusinessId::from("biz-1")
    }

    fn invoice_input(number: &str) -> InvoiceCreateInput {
        InvoiceCreateInput {
            business_id: biz(),
            customer_id: CustomerId::from("cust-1"),
            status: InvoiceCreateStatus::Saved,
            currency: "USD".to_owned(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 18).unwrap(),
            title: "Week ending Jan 08, 2024".to_owned(),
            invoice_number: number.to_owned(),
            items: vec![InvoiceItemInput {
                product_id: ProductId::from("prod-1"),
                description: "Logo".to_owned(),
                quantity: 1.0,
                unit_price: 10.0,
            }],
            memo: None,
        }
    }

    #[test]
    fn source_filters_rows_by_window() {
        let row = |reference: &str, date: &str| -> Record {
            [("reference", reference), ("date", date)]
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect()
        };
        let source = InMemorySource::new()
            .with_row(row("A", "20240105"))
            .with_row(row("B", "20240210"));
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let response = source.report_transactions("acct", from, to, "*").unwrap();
        let records = crate::models::flatten(&response);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["reference"], "A");
        assert_eq!(source.report_calls().unwrap(), vec![(from, to)]);
    }

    #[test]
    fn source_without_teams() {
        assert!(InMemorySource::without_teams().teams().unwrap().is_none());
        assert_eq!(InMemorySource::new().teams().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn duplicate_invoice_numbers_are_rejected() {
        let wave = InMemoryDestination::new();
        assert!(wave.create_invoice(&invoice_input("R1")).unwrap().did_succeed);
        let second = wave.create_invoice(&invoice_input("R1")).unwrap();
        assert!(!second.did_succeed);
        assert_eq!(wave.invoices_of(&biz()).unwrap().len(), 1);
    }

    #[test]
    fn payment_marks_invoice_paid() {
        let wave = InMemoryDestination::new();
        let invoice = wave
            .create_invoice(&invoice_input("R1"))
            .unwrap()
            .into_entity()
            .unwrap();
        let payment = wave
            .create_payment(&PaymentInput {
                business_id: biz(),
                invoice_id: invoice.id.clone(),
                account: Account {
                    id: crate::models::AccountId::from("acct-1"),
                    name: "Escrow".to_owned(),
                    classic_id: None,
                },
                amount: 10.0,
                payment_date: invoice.invoice_date,
                method: PaymentMethod::Other,
                memo: None,
            })
            .unwrap();
        assert!(payment.id.as_inner().starts_with("pay-"));
        let stored = wave.invoice(&biz(), &invoice.id).unwrap().unwrap();
        assert_eq!(stored.status, "PAID");
    }

    #[test]
    fn patch_unknown_customer_is_rejected() {
        let wave = InMemoryDestination::new();
        let outcome = wave
            .patch_customer(&Customer {
                id: CustomerId::from("missing"),
                name: "Ghost".to_owned(),
                ..Customer::default()
            }.patch_input())
            .unwrap();
        assert!(!outcome.did_succeed);
    }
}
