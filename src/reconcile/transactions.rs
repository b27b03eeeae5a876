//! Transaction reconciliation: one Wave invoice (and payment) per Upwork
//! income transaction.
//!
//! Invoices are keyed by the transaction reference, which becomes the Wave
//! invoice number. A transaction whose invoice already exists is left
//! alone, so re-running a window never duplicates anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CustomerDirectory, source_memo};
use crate::dates;
use crate::description;
use crate::error::Result;
use crate::models::{
    Account, AccountId, Business, Customer, DEFAULT_CURRENCY, Invoice, InvoiceCreateInput,
    InvoiceCreateStatus, InvoiceItemInput, InvoiceQuery, Payment, PaymentInput, PaymentMethod,
    Product, ProductId, SourceTransaction,
};
use crate::platform::DestinationPlatform;

/// Wave products and accounts keyed by Upwork `type-subtype`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mappings {
    /// Product placed on the invoice line.
    #[serde(default)]
    pub products: BTreeMap<String, ProductId>,
    /// Account the payment is deposited into.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountId>,
}

/// Static inputs of the transaction reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Product and account mappings.
    pub mappings: Mappings,
    /// Method recorded on payments.
    pub payment_method: PaymentMethod,
    /// Currency code of created invoices.
    pub currency: String,
}

impl Default for ReconcileSettings {
    #[inline]
    fn default() -> Self {
        Self {
            mappings: Mappings::default(),
            payment_method: PaymentMethod::default(),
            currency: DEFAULT_CURRENCY.to_owned(),
        }
    }
}

/// What happened to a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionOutcome {
    /// No Wave customer for the buyer team.
    Unmatched,
    /// Zero or negative amount; expenses are not synced.
    NotIncome,
    /// An invoice with this reference already exists.
    InvoiceExists,
    /// No product mapped (or the mapped product is gone).
    ProductMissing,
    /// Wave rejected or failed the invoice creation.
    CreateFailed,
    /// A lookup failed, so nothing was attempted.
    Failed,
    /// Invoice created, payment not recorded.
    Invoiced,
    /// Invoice created and paid.
    Paid,
}

impl TransactionOutcome {
    /// Every outcome, in report order.
    pub const ALL: [Self; 8] = [
        Self::Paid,
        Self::Invoiced,
        Self::InvoiceExists,
        Self::Unmatched,
        Self::NotIncome,
        Self::ProductMissing,
        Self::CreateFailed,
        Self::Failed,
    ];

    /// Short label for summaries.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::NotIncome => "not income",
            Self::InvoiceExists => "invoice exists",
            Self::ProductMissing => "product missing",
            Self::CreateFailed => "create failed",
            Self::Failed => "failed",
            Self::Invoiced => "invoiced",
            Self::Paid => "paid",
        }
    }
}

impl core::fmt::Display for TransactionOutcome {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoices, payments and outcome counts of one or more windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionReport {
    /// Invoices created.
    invoices: Vec<Invoice>,
    /// Payments recorded.
    payments: Vec<Payment>,
    /// Number of transactions per outcome.
    counts: BTreeMap<TransactionOutcome, usize>,
}

impl TransactionReport {
    /// Invoices created, in creation order.
    #[inline]
    #[must_use]
    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    /// Payments recorded, in creation order.
    #[inline]
    #[must_use]
    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// Counts one transaction under `outcome`.
    pub fn record(&mut self, outcome: TransactionOutcome) {
        *self.counts.entry(outcome).or_default() += 1;
    }

    /// Number of transactions that ended in `outcome`.
    #[must_use]
    pub fn count(&self, outcome: TransactionOutcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or_default()
    }

    /// Number of transactions processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Folds `other` into this report.
    pub fn merge(&mut self, other: Self) {
        self.invoices.extend(other.invoices);
        self.payments.extend(other.payments);
        for (outcome, count) in other.counts {
            *self.counts.entry(outcome).or_default() += count;
        }
    }
}

/// Creates invoices and payments for source transactions.
#[derive(Debug)]
pub struct TransactionReconciler<'dest, D: ?Sized> {
    /// Wave collaborator.
    destination: &'dest D,
    /// Mappings, currency and payment method.
    settings: &'dest ReconcileSettings,
}

impl<'dest, D: DestinationPlatform + ?Sized> TransactionReconciler<'dest, D> {
    /// Creates a reconciler writing to `destination`.
    #[inline]
    #[must_use]
    pub const fn new(destination: &'dest D, settings: &'dest ReconcileSettings) -> Self {
        Self {
            destination,
            settings,
        }
    }

    /// Reconciles `transactions` for `business`, resolving buyers through
    /// `directory`.
    ///
    /// Per-transaction failures are logged and counted; they never abort
    /// the pass.
    #[tracing::instrument(skip_all, fields(business = %business.id, transactions = transactions.len()))]
    pub fn reconcile(
        &self,
        business: &Business,
        transactions: &[SourceTransaction],
        directory: &CustomerDirectory,
    ) -> TransactionReport {
        let mut report = TransactionReport::default();
        for transaction in transactions {
            let outcome = self.reconcile_one(business, transaction, directory, &mut report);
            report.record(outcome);
        }
        tracing::info!(
            processed = report.total(),
            invoiced = report.invoices.len(),
            paid = report.payments.len(),
            "transactions reconciled"
        );
        report
    }

    /// Runs the invoice/payment path for one transaction.
    fn reconcile_one(
        &self,
        business: &Business,
        transaction: &SourceTransaction,
        directory: &CustomerDirectory,
        report: &mut TransactionReport,
    ) -> TransactionOutcome {
        let reference = transaction.reference.as_str();
        let Some(customer) = transaction
            .buyer_reference
            .as_deref()
            .and_then(|buyer| directory.get(buyer))
        else {
            tracing::trace!(
                reference,
                buyer = transaction.buyer_reference.as_deref().unwrap_or_default(),
                "no customer for buyer"
            );
            return TransactionOutcome::Unmatched;
        };

        if transaction.amount <= 0.0 {
            tracing::debug!(reference, amount = transaction.amount, "not income, skipping");
            return TransactionOutcome::NotIncome;
        }

        match self.existing_invoice(business, reference) {
            Ok(Some(invoice)) => {
                tracing::debug!(reference, invoice = %invoice.id, "invoice already exists");
                return TransactionOutcome::InvoiceExists;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(reference, error = %err, "invoice lookup failed");
                return TransactionOutcome::Failed;
            }
        }

        let type_key = transaction.type_key();
        let product = match self.mapped_product(business, &type_key) {
            Ok(Some(product)) => product,
            Ok(None) => {
                tracing::warn!(reference, type_key = %type_key, "no product mapped for transaction type");
                return TransactionOutcome::ProductMissing;
            }
            Err(err) => {
                tracing::warn!(reference, type_key = %type_key, error = %err, "product lookup failed");
                return TransactionOutcome::Failed;
            }
        };

        let input = self.invoice_input(business, customer, &product, transaction);
        let invoice = match self.destination.create_invoice(&input) {
            Ok(outcome) if outcome.did_succeed => {
                let Some(invoice) = outcome.entity else {
                    tracing::warn!(reference, "invoice create returned no invoice");
                    return TransactionOutcome::CreateFailed;
                };
                invoice
            }
            Ok(outcome) => {
                tracing::warn!(
                    reference,
                    errors = %outcome.error_summary(),
                    "invoice create rejected"
                );
                return TransactionOutcome::CreateFailed;
            }
            Err(err) => {
                tracing::warn!(reference, error = %err, "invoice create failed");
                return TransactionOutcome::CreateFailed;
            }
        };
        tracing::info!(reference, invoice = %invoice.id, "invoice created");

        let outcome = self.pay(business, &invoice, transaction, &type_key, report);
        report.invoices.push(invoice);
        outcome
    }

    /// Finds the invoice numbered `reference`, fetching it in full.
    fn existing_invoice(
        &self,
        business: &Business,
        reference: &str,
    ) -> Result<Option<Invoice>> {
        let found = self
            .destination
            .invoices(&business.id, &InvoiceQuery::by_number(reference))?
            .into_iter()
            .find(|invoice| invoice.invoice_number == reference);
        let Some(summary) = found else {
            return Ok(None);
        };
        match self.destination.invoice(&business.id, &summary.id) {
            Ok(Some(invoice)) => Ok(Some(invoice)),
            Ok(None) => Ok(Some(summary)),
            Err(err) => {
                tracing::debug!(reference, error = %err, "full invoice fetch failed");
                Ok(Some(summary))
            }
        }
    }

    /// Resolves the product mapped to `type_key`.
    fn mapped_product(
        &self,
        business: &Business,
        type_key: &str,
    ) -> Result<Option<Product>> {
        let Some(product_id) = self.settings.mappings.products.get(type_key) else {
            return Ok(None);
        };
        self.destination.product(&business.id, product_id)
    }

    /// Resolves the account mapped to `type_key`, if it exists in Wave.
    fn mapped_account(
        &self,
        business: &Business,
        type_key: &str,
    ) -> Result<Option<Account>> {
        let Some(account_id) = self.settings.mappings.accounts.get(type_key) else {
            return Ok(None);
        };
        Ok(self
            .destination
            .accounts(&business.id)?
            .into_iter()
            .find(|account| account.id == *account_id))
    }

    /// Builds the invoice for `transaction`.
    ///
    /// Parsed hourly descriptions bill hours at the hourly rate; anything
    /// else bills one unit at the full amount.
    fn invoice_input(
        &self,
        business: &Business,
        customer: &Customer,
        product: &Product,
        transaction: &SourceTransaction,
    ) -> InvoiceCreateInput {
        let (title, item) = description::parse(&transaction.description).map_or_else(
            || {
                (
                    format!("Week ending {}", dates::human(transaction.date_posted)),
                    InvoiceItemInput {
                        product_id: product.id.clone(),
                        description: transaction.description.clone(),
                        quantity: 1.0,
                        unit_price: transaction.amount,
                    },
                )
            },
            |parsed| {
                (
                    parsed.title(),
                    InvoiceItemInput {
                        product_id: product.id.clone(),
                        description: parsed.line_description(),
                        quantity: parsed.quantity(),
                        unit_price: parsed.unit_price,
                    },
                )
            },
        );
        InvoiceCreateInput {
            business_id: business.id.clone(),
            customer_id: customer.id.clone(),
            status: InvoiceCreateStatus::Saved,
            currency: self.settings.currency.clone(),
            invoice_date: transaction.date_posted,
            due_date: transaction.date_due,
            title,
            invoice_number: transaction.reference.clone(),
            items: vec![item],
            memo: Some(source_memo(transaction.raw_json())),
        }
    }

    /// Records the payment for a freshly created invoice.
    fn pay(
        &self,
        business: &Business,
        invoice: &Invoice,
        transaction: &SourceTransaction,
        type_key: &str,
        report: &mut TransactionReport,
    ) -> TransactionOutcome {
        let reference = transaction.reference.as_str();
        let account = match self.mapped_account(business, type_key) {
            Ok(Some(account)) => account,
            Ok(None) => {
                // The payment is not retried on later runs because the
                // invoice now exists.
                tracing::warn!(reference, type_key, "no account mapped, invoice left unpaid");
                return TransactionOutcome::Invoiced;
            }
            Err(err) => {
                tracing::warn!(reference, error = %err, "account lookup failed, invoice left unpaid");
                return TransactionOutcome::Invoiced;
            }
        };
        let input = PaymentInput {
            business_id: business.id.clone(),
            invoice_id: invoice.id.clone(),
            account,
            amount: transaction.amount,
            payment_date: transaction.date_posted,
            method: self.settings.payment_method,
            memo: Some(source_memo(transaction.raw_json())),
        };
        match self.destination.create_payment(&input) {
            Ok(payment) => {
                tracing::info!(reference, payment = %payment.id, "payment recorded");
                report.payments.push(payment);
                TransactionOutcome::Paid
            }
            Err(err) => {
                tracing::warn!(reference, error = %err, "payment failed, invoice left unpaid");
                TransactionOutcome::Invoiced
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessId, CustomerId, InvoiceId, NaiveDate, Record};
    use crate::platform::InMemoryDestination;
    use crate::platform::memory::MutationLog;

    const TYPE_KEY: &str = "Hourly-Invoice";

    fn business() -> Business {
        Business {
            id: BusinessId::from("biz-1"),
            name: "Freelance Co".to_owned(),
            currency: None,
        }
    }

    fn customer() -> Customer {
        Customer {
            id: CustomerId::from("cust-1"),
            display_id: Some("T1".to_owned()),
            name: "Acme".to_owned(),
            ..Customer::default()
        }
    }

    fn directory() -> CustomerDirectory {
        CustomerDirectory::new(&[customer()], &[])
    }

    fn settings() -> ReconcileSettings {
        let mut settings = ReconcileSettings::default();
        let _old = settings
            .mappings
            .products
            .insert(TYPE_KEY.to_owned(), ProductId::from("prod-1"));
        let _prev = settings
            .mappings
            .accounts
            .insert(TYPE_KEY.to_owned(), AccountId::from("acct-1"));
        settings
    }

    fn wave() -> InMemoryDestination {
        let biz = business().id;
        InMemoryDestination::new()
            .with_business(business())
            .with_customer(&biz, customer())
            .with_product(
                &biz,
                Product {
                    id: ProductId::from("prod-1"),
                    name: "Freelance work".to_owned(),
                },
            )
            .with_account(
                &biz,
                Account {
                    id: AccountId::from("acct-1"),
                    name: "Upwork escrow".to_owned(),
                    classic_id: Some("101".to_owned()),
                },
            )
    }

    fn transaction(reference: &str, amount: &str, description: &str) -> SourceTransaction {
        let record: Record = [
            ("reference", reference),
            ("amount", amount),
            ("type", "Hourly"),
            ("subtype", "Invoice"),
            ("description", description),
            ("date", "20240108"),
            ("date_due", "20240118"),
            ("buyer_team__reference", "T1"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
        SourceTransaction::from_record(&record).unwrap()
    }

    const HOURLY: &str = "(Design) Logo - 3:30 hrs @ $25.00/hr - 01/01/2024 - 01/07/2024";

    #[test]
    fn hourly_transaction_is_invoiced_and_paid() {
        let wave = wave();
        let settings = settings();
        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::Paid), 1);
        let invoice = &report.invoices()[0];
        assert_eq!(invoice.invoice_number, "R1");
        assert_eq!(invoice.title.as_deref(), Some("Week of Jan 01, 2024 to Jan 07, 2024"));
        assert_eq!(invoice.currency, "USD");
        let item = &invoice.items[0];
        assert!((item.quantity - 3.5).abs() < f64::EPSILON);
        assert!((item.unit_price - 25.0).abs() < f64::EPSILON);
        assert_eq!(item.description.as_deref(), Some("Design - Logo"));
        let memo: serde_json::Value =
            serde_json::from_str(invoice.memo.as_deref().unwrap()).unwrap();
        assert_eq!(memo["upwork"]["reference"], "R1");

        let payments = wave.payments().unwrap();
        assert_eq!(payments.len(), 1);
        let input = &payments[0].1;
        assert!((input.amount - 87.5).abs() < f64::EPSILON);
        assert_eq!(input.payment_date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(input.method, PaymentMethod::Other);
    }

    #[test]
    fn free_text_description_bills_one_unit() {
        let wave = wave();
        let settings = settings();
        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R2", "500.00", "Milestone 2: final delivery")],
            &directory(),
        );

        let invoice = &report.invoices()[0];
        assert_eq!(invoice.title.as_deref(), Some("Week ending Jan 08, 2024"));
        let item = &invoice.items[0];
        assert!((item.quantity - 1.0).abs() < f64::EPSILON);
        assert!((item.unit_price - 500.0).abs() < f64::EPSILON);
        assert_eq!(item.description.as_deref(), Some("Milestone 2: final delivery"));
    }

    #[test]
    fn rerun_does_not_duplicate() {
        let wave = wave();
        let settings = settings();
        let reconciler = TransactionReconciler::new(&wave, &settings);
        let batch = [transaction("R1", "87.50", HOURLY)];

        let first = reconciler.reconcile(&business(), &batch, &directory());
        let second = reconciler.reconcile(&business(), &batch, &directory());

        assert_eq!(first.count(TransactionOutcome::Paid), 1);
        assert_eq!(second.count(TransactionOutcome::InvoiceExists), 1);
        assert_eq!(wave.invoices_of(&business().id).unwrap().len(), 1);
        assert_eq!(wave.payments().unwrap().len(), 1);
    }

    #[test]
    fn unmatched_and_non_income_make_no_calls() {
        let wave = wave();
        let settings = settings();
        let mut stranger = transaction("R3", "10.00", HOURLY);
        stranger.buyer_reference = Some("T9".to_owned());
        let refund = transaction("R4", "-10.00", HOURLY);
        let zero = transaction("R5", "0", HOURLY);

        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[stranger, refund, zero],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::Unmatched), 1);
        assert_eq!(report.count(TransactionOutcome::NotIncome), 2);
        assert!(wave.mutations().unwrap().is_empty());
    }

    #[test]
    fn missing_product_mapping_skips() {
        let wave = wave();
        let mut settings = settings();
        settings.mappings.products.clear();

        let (report, warnings) = crate::testing::count_warnings(|| {
            TransactionReconciler::new(&wave, &settings).reconcile(
                &business(),
                &[transaction("R1", "87.50", HOURLY)],
                &directory(),
            )
        });

        assert_eq!(report.count(TransactionOutcome::ProductMissing), 1);
        assert_eq!(warnings, 1);
        assert!(wave.mutations().unwrap().is_empty());
    }

    #[test]
    fn minutes_past_the_hour_bill_one_unit() {
        let wave = wave();
        let settings = settings();
        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction(
                "R6",
                "87.50",
                "(Design) Logo - 3:75 hrs @ $25.00/hr - 01/01/2024 - 01/07/2024",
            )],
            &directory(),
        );

        let item = &report.invoices()[0].items[0];
        assert!((item.quantity - 1.0).abs() < f64::EPSILON);
        assert!((item.unit_price - 87.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_account_leaves_invoice_unpaid() {
        let wave = wave();
        let mut settings = settings();
        settings.mappings.accounts.clear();

        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::Invoiced), 1);
        assert_eq!(report.invoices().len(), 1);
        assert!(wave.payments().unwrap().is_empty());
    }

    #[test]
    fn rejected_invoice_is_not_retried() {
        let wave = wave().rejecting_invoice("R1");
        let settings = settings();

        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::CreateFailed), 1);
        assert_eq!(
            wave.mutations().unwrap(),
            vec![MutationLog::CreateInvoice("R1".to_owned())]
        );
    }

    #[test]
    fn failed_lookup_never_creates() {
        let wave = wave().failing_invoice_lookups();
        let settings = settings();

        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::Failed), 1);
        assert!(wave.mutations().unwrap().is_empty());
    }

    #[test]
    fn existing_invoice_is_left_alone() {
        let biz = business();
        let wave = wave().with_invoice(
            &biz.id,
            Invoice {
                id: InvoiceId::from("inv-7"),
                invoice_number: "R1".to_owned(),
                customer_id: CustomerId::from("cust-1"),
                title: None,
                currency: "USD".to_owned(),
                status: "PAID".to_owned(),
                invoice_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                due_date: None,
                items: Vec::new(),
                memo: None,
            },
        );
        let settings = settings();

        let report = TransactionReconciler::new(&wave, &settings).reconcile(
            &biz,
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        assert_eq!(report.count(TransactionOutcome::InvoiceExists), 1);
        assert!(wave.mutations().unwrap().is_empty());
    }

    #[test]
    fn reports_merge() {
        let mut total = TransactionReport::default();
        let mut window = TransactionReport::default();
        window.record(TransactionOutcome::Paid);
        window.record(TransactionOutcome::Unmatched);
        total.merge(window.clone());
        total.merge(window);
        assert_eq!(total.count(TransactionOutcome::Paid), 2);
        assert_eq!(total.total(), 4);
    }

    #[test]
    fn merge_carries_created_entities() {
        let wave = wave();
        let settings = settings();
        let window = TransactionReconciler::new(&wave, &settings).reconcile(
            &business(),
            &[transaction("R1", "87.50", HOURLY)],
            &directory(),
        );

        let mut total = TransactionReport::default();
        total.merge(window);
        assert_eq!(total.invoices().len(), 1);
        assert_eq!(total.payments().len(), 1);
        assert_eq!(total.invoices()[0].invoice_number, "R1");
    }
}
