//! TOML configuration of a sync run.
//!
//! API tokens are not part of the file; the CLI reads them from the
//! environment.
//!
//! ```toml
//! [wave]
//! business_id = "QnVzaW5lc3M6MQ=="
//!
//! [upwork]
//! account_ref = "1234567"
//!
//! [sync]
//! window = { months = 1 }
//! payment_method = "other"
//!
//! [mappings.products]
//! "Hourly-Invoice" = "UHJvZHVjdDox"
//!
//! [mappings.accounts]
//! "Hourly-Invoice" = "QWNjb3VudDox"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dates::WindowSpan;
use crate::error::{LongboardError, Result};
use crate::models::{BusinessId, DEFAULT_CURRENCY, NaiveDate, PaymentMethod};
use crate::reconcile::{Mappings, ReconcileSettings};

/// Report columns requested from Upwork when none are configured.
pub const DEFAULT_REPORT_FIELDS: &str =
    "reference, date, date_due, amount, type, subtype, description, buyer_team__reference";

/// Complete configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Destination settings.
    pub wave: WaveConfig,
    /// Source settings.
    pub upwork: UpworkConfig,
    /// Run settings.
    #[serde(default)]
    pub sync: RunConfig,
    /// Product and account mappings.
    #[serde(default)]
    pub mappings: Mappings,
}

/// `[wave]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaveConfig {
    /// Business whose books are synced.
    pub business_id: BusinessId,
    /// GraphQL API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// REST API base URL override.
    #[serde(default)]
    pub rest_url: Option<String>,
}

/// `[upwork]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpworkConfig {
    /// Financial account reference the reports are run for.
    pub account_ref: String,
    /// Comma-separated report columns.
    #[serde(default = "default_report_fields")]
    pub report_fields: String,
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// `[sync]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// First day to sync; defaults to the first of the current month.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Last day to sync; defaults to today.
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Size of each report query.
    #[serde(default)]
    pub window: WindowSpan,
    /// Method recorded on payments.
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Currency of created invoices.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for RunConfig {
    #[inline]
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            window: WindowSpan::default(),
            payment_method: PaymentMethod::default(),
            currency: default_currency(),
        }
    }
}

/// Serde default for [`UpworkConfig::report_fields`].
fn default_report_fields() -> String {
    DEFAULT_REPORT_FIELDS.to_owned()
}

/// Serde default for [`RunConfig::currency`].
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_owned()
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Config`] if the document does not parse or
    /// a required value is blank.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| LongboardError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Io`] if the file cannot be read and
    /// [`LongboardError::Config`] if it is invalid.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        tracing::debug!(bytes = text.len(), "read configuration");
        Self::from_toml_str(&text)
    }

    /// Settings handed to the transaction reconciler.
    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            mappings: self.mappings.clone(),
            payment_method: self.sync.payment_method,
            currency: self.sync.currency.clone(),
        }
    }

    /// Rejects blank identifiers and mapping values.
    fn validate(&self) -> Result<()> {
        if self.wave.business_id.is_blank() {
            return Err(LongboardError::Config("wave.business_id is blank".to_owned()));
        }
        if self.upwork.account_ref.trim().is_empty() {
            return Err(LongboardError::Config("upwork.account_ref is blank".to_owned()));
        }
        if self.upwork.report_fields.trim().is_empty() {
            return Err(LongboardError::Config("upwork.report_fields is blank".to_owned()));
        }
        if self.sync.currency.trim().is_empty() {
            return Err(LongboardError::Config("sync.currency is blank".to_owned()));
        }
        if let Some(key) = self
            .mappings
            .products
            .iter()
            .find(|entry| entry.1.is_blank())
            .map(|entry| entry.0)
        {
            return Err(LongboardError::Config(format!(
                "mappings.products.\"{key}\" is blank"
            )));
        }
        if let Some(key) = self
            .mappings
            .accounts
            .iter()
            .find(|entry| entry.1.is_blank())
            .map(|entry| entry.0)
        {
            return Err(LongboardError::Config(format!(
                "mappings.accounts.\"{key}\" is blank"
            )));
        }
        Ok(())
    }
}
