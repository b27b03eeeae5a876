//! The sync job: Upwork teams and transactions into Wave.
//!
//! A run resolves the business, reconciles customers once and then walks
//! the date range window by window, reconciling each window's
//! transactions. Only the business lookup, the team list and the Wave
//! customer listing can abort a run.

use chrono::Local;

use crate::config::{DEFAULT_REPORT_FIELDS, SyncConfig};
use crate::dates::{self, DateRange, WindowSpan};
use crate::error::{LongboardError, Result};
use crate::models::{Business, BusinessId, NaiveDate, SourceTeam, SourceTransaction, flatten};
use crate::platform::{DestinationPlatform, SourcePlatform};
use crate::reconcile::{
    CustomerDirectory, CustomerReconciler, CustomerReport, ReconcileSettings,
    TransactionReconciler, TransactionReport,
};

/// Builder for constructing a [`Longboard`].
#[derive(Debug)]
pub struct LongboardBuilder<S: SourcePlatform, D: DestinationPlatform> {
    /// Upwork collaborator.
    source: Option<S>,
    /// Wave collaborator.
    destination: Option<D>,
    /// Reconciler settings.
    settings: ReconcileSettings,
    /// Upwork financial account reference.
    account_ref: Option<String>,
    /// Report columns.
    report_fields: String,
    /// Query window size.
    window: WindowSpan,
    /// Business used by [`Longboard::run_configured`].
    business_id: Option<BusinessId>,
    /// Configured first day.
    start: Option<NaiveDate>,
    /// Configured last day.
    end: Option<NaiveDate>,
}

impl<S: SourcePlatform, D: DestinationPlatform> LongboardBuilder<S, D> {
    /// Sets the Upwork collaborator.
    #[inline]
    #[must_use]
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the Wave collaborator.
    #[inline]
    #[must_use]
    pub fn destination(mut self, destination: D) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Sets mappings, currency and payment method.
    #[inline]
    #[must_use]
    pub fn settings(mut self, settings: ReconcileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the Upwork financial account the reports are run for.
    #[inline]
    #[must_use]
    pub fn account_ref<T: Into<String>>(mut self, account_ref: T) -> Self {
        self.account_ref = Some(account_ref.into());
        self
    }

    /// Overrides the requested report columns.
    #[inline]
    #[must_use]
    pub fn report_fields<T: Into<String>>(mut self, fields: T) -> Self {
        self.report_fields = fields.into();
        self
    }

    /// Sets the query window size.
    #[inline]
    #[must_use]
    pub const fn window(mut self, window: WindowSpan) -> Self {
        self.window = window;
        self
    }

    /// Takes everything except the collaborators from `config`.
    #[must_use]
    pub fn config(mut self, config: &SyncConfig) -> Self {
        self.settings = config.reconcile_settings();
        self.account_ref = Some(config.upwork.account_ref.clone());
        self.report_fields.clone_from(&config.upwork.report_fields);
        self.window = config.sync.window;
        self.business_id = Some(config.wave.business_id.clone());
        self.start = config.sync.start;
        self.end = config.sync.end;
        self
    }

    /// Builds the job.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Config`] if a collaborator or the account
    /// reference is missing.
    #[inline]
    pub fn build(self) -> Result<Longboard<S, D>> {
        let source = self
            .source
            .ok_or_else(|| LongboardError::Config("source platform is required".to_owned()))?;
        let destination = self.destination.ok_or_else(|| {
            LongboardError::Config("destination platform is required".to_owned())
        })?;
        let account_ref = self
            .account_ref
            .ok_or_else(|| LongboardError::Config("upwork account_ref is required".to_owned()))?;
        Ok(Longboard {
            source,
            destination,
            settings: self.settings,
            account_ref,
            report_fields: self.report_fields,
            window: self.window,
            business_id: self.business_id,
            start: self.start,
            end: self.end,
        })
    }
}

/// What one window of a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    /// Dates covered.
    pub range: DateRange,
    /// Report rows received.
    pub rows: usize,
    /// Rows skipped because they did not convert.
    pub malformed: usize,
    /// Why the report fetch failed, if it did.
    pub error: Option<String>,
    /// Reconciliation result.
    pub transactions: TransactionReport,
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Business synced.
    pub business: Business,
    /// Resolved date range.
    pub range: DateRange,
    /// Customer reconciliation result.
    pub customers: CustomerReport,
    /// Per-window results, in date order.
    pub windows: Vec<WindowReport>,
}

impl SyncReport {
    /// Transaction results of all windows merged.
    #[must_use]
    pub fn totals(&self) -> TransactionReport {
        let mut totals = TransactionReport::default();
        for window in &self.windows {
            totals.merge(window.transactions.clone());
        }
        totals
    }

    /// Number of windows whose report could not be fetched.
    #[must_use]
    pub fn failed_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|window| window.error.is_some())
            .count()
    }
}

/// The Upwork to Wave sync job.
///
/// Use [`Longboard::builder()`] to construct an instance.
#[derive(Debug)]
pub struct Longboard<S: SourcePlatform, D: DestinationPlatform> {
    /// Upwork collaborator.
    source: S,
    /// Wave collaborator.
    destination: D,
    /// Reconciler settings.
    settings: ReconcileSettings,
    /// Upwork financial account reference.
    account_ref: String,
    /// Report columns.
    report_fields: String,
    /// Query window size.
    window: WindowSpan,
    /// Business used by [`Longboard::run_configured`].
    business_id: Option<BusinessId>,
    /// Configured first day.
    start: Option<NaiveDate>,
    /// Configured last day.
    end: Option<NaiveDate>,
}

impl<S: SourcePlatform, D: DestinationPlatform> Longboard<S, D> {
    /// Creates a new builder for configuring the job.
    #[inline]
    #[must_use]
    pub fn builder() -> LongboardBuilder<S, D> {
        LongboardBuilder {
            source: None,
            destination: None,
            settings: ReconcileSettings::default(),
            account_ref: None,
            report_fields: DEFAULT_REPORT_FIELDS.to_owned(),
            window: WindowSpan::default(),
            business_id: None,
            start: None,
            end: None,
        }
    }

    /// The Upwork collaborator.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The Wave collaborator.
    #[inline]
    #[must_use]
    pub const fn destination(&self) -> &D {
        &self.destination
    }

    /// Resolves optional boundaries against today's date.
    #[must_use]
    pub fn resolve_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateRange {
        DateRange::resolve(start, end, Local::now().date_naive())
    }

    /// The windows a run over `[start, end]` would query.
    #[must_use]
    pub fn windows(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<DateRange> {
        dates::split(Self::resolve_range(start, end), self.window)
    }

    /// Runs with the business and dates taken from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Config`] if no business was configured,
    /// otherwise as [`Longboard::run`].
    #[inline]
    pub fn run_configured(&self) -> Result<SyncReport> {
        let business_id = self
            .business_id
            .as_ref()
            .ok_or_else(|| LongboardError::Config("no business configured".to_owned()))?;
        self.run(business_id, self.start, self.end)
    }

    /// Syncs `business_id` over `[start, end]`.
    ///
    /// Missing boundaries default to the current month up to today.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::BusinessNotFound`] if the business does not
    /// exist, [`LongboardError::InvalidTeams`] if the team list is absent or
    /// malformed, or the transport error of the business, team or customer
    /// listing.
    #[inline]
    pub fn run(
        &self,
        business_id: &BusinessId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<SyncReport> {
        self.run_range(business_id, Self::resolve_range(start, end))
    }

    /// Syncs `business_id` over an already resolved range.
    ///
    /// # Errors
    ///
    /// As [`Longboard::run`].
    #[tracing::instrument(skip_all, fields(business = %business_id, range = %range))]
    pub fn run_range(&self, business_id: &BusinessId, range: DateRange) -> Result<SyncReport> {
        tracing::info!("starting sync");
        let Some(business) = self.destination.business(business_id)? else {
            tracing::error!("business not found, aborting");
            return Err(LongboardError::BusinessNotFound(business_id.clone()));
        };

        let teams = self.teams()?;
        let existing = self
            .destination
            .customers(&business.id)
            .inspect_err(|err| tracing::error!(error = %err, "listing customers failed, aborting"))?;
        let customers = CustomerReconciler::new(&self.destination).reconcile(
            &business,
            &teams,
            &existing,
        );
        let directory = CustomerDirectory::new(&existing, &customers.customers);
        tracing::debug!(billable = directory.len(), "customer directory built");

        let windows = dates::split(range, self.window)
            .into_iter()
            .map(|window| self.sync_window(&business, window, &directory))
            .collect();

        let report = SyncReport {
            business,
            range,
            customers,
            windows,
        };
        let totals = report.totals();
        tracing::info!(
            windows = report.windows.len(),
            failed_windows = report.failed_windows(),
            invoices = totals.invoices().len(),
            payments = totals.payments().len(),
            "sync finished"
        );
        Ok(report)
    }

    /// Fetches and validates the team list.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::InvalidTeams`] if the list is absent or a
    /// team is malformed.
    #[tracing::instrument(skip_all)]
    pub fn teams(&self) -> Result<Vec<SourceTeam>> {
        let Some(raw) = self.source.teams()? else {
            tracing::error!("team response has no team list, aborting");
            return Err(LongboardError::InvalidTeams(
                "response contained no team list".to_owned(),
            ));
        };
        let teams = raw
            .into_iter()
            .map(SourceTeam::from_value)
            .collect::<Result<Vec<_>>>()
            .map_err(|err| {
                tracing::error!(error = %err, "malformed team, aborting");
                LongboardError::InvalidTeams(err.to_string())
            })?;
        tracing::debug!(teams = teams.len(), "fetched teams");
        Ok(teams)
    }

    /// Fetches and reconciles one window.
    #[tracing::instrument(skip_all, fields(window = %window))]
    fn sync_window(
        &self,
        business: &Business,
        window: DateRange,
        directory: &CustomerDirectory,
    ) -> WindowReport {
        let response = match self.source.report_transactions(
            &self.account_ref,
            window.start,
            window.end,
            &self.report_fields,
        ) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "report fetch failed, skipping window");
                return WindowReport {
                    range: window,
                    rows: 0,
                    malformed: 0,
                    error: Some(err.to_string()),
                    transactions: TransactionReport::default(),
                };
            }
        };

        let records = flatten(&response);
        let mut malformed = 0_usize;
        let transactions: Vec<SourceTransaction> = records
            .iter()
            .filter_map(|record| match SourceTransaction::from_record(record) {
                Ok(transaction) => Some(transaction),
                Err(err) => {
                    tracing::warn!(
                        reference = record.get("reference").map_or("", String::as_str),
                        error = %err,
                        "skipping malformed report row"
                    );
                    malformed += 1;
                    None
                }
            })
            .collect();

        let reconciled = TransactionReconciler::new(&self.destination, &self.settings)
            .reconcile(business, &transactions, directory);
        WindowReport {
            range: window,
            rows: records.len(),
            malformed,
            error: None,
            transactions: reconciled,
        }
    }
}
