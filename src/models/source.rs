//! Typed views over raw Upwork records.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::Record;
use crate::error::{LongboardError, Result};

/// Date format used by the finance report columns.
pub const REPORT_DATE_FORMAT: &str = "%Y%m%d";

/// Report column names consumed by [`SourceTransaction::from_record`].
mod column {
    /// Stable transaction reference.
    pub(super) const REFERENCE: &str = "reference";
    /// Signed amount.
    pub(super) const AMOUNT: &str = "amount";
    /// Transaction type.
    pub(super) const TYPE: &str = "type";
    /// Transaction sub type.
    pub(super) const SUBTYPE: &str = "subtype";
    /// Free-text description.
    pub(super) const DESCRIPTION: &str = "description";
    /// Posting date.
    pub(super) const DATE: &str = "date";
    /// Due date.
    pub(super) const DATE_DUE: &str = "date_due";
    /// Buyer team reference, joins to a Wave customer display id.
    pub(super) const BUYER_REFERENCE: &str = "buyer_team__reference";
}

/// One row of the Upwork financial report.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTransaction {
    /// Stable external id, also used as the invoice number.
    pub reference: String,
    /// Signed amount; positive is income.
    pub amount: f64,
    /// Free-text description, possibly in the fixed invoice grammar.
    pub description: String,
    /// Date the transaction was posted.
    pub date_posted: NaiveDate,
    /// Date the transaction is due.
    pub date_due: NaiveDate,
    /// Transaction type (`type` column).
    pub kind: String,
    /// Transaction sub type (`subtype` column).
    pub sub_kind: String,
    /// Reference of the buying team, if any.
    pub buyer_reference: Option<String>,
    /// The flattened source row.
    pub raw: Record,
}

impl SourceTransaction {
    /// Builds a transaction from a flattened report row.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Record`] if a required column is
    /// missing or its value cannot be parsed.
    pub fn from_record(record: &Record) -> Result<Self> {
        let amount_text = required(record, column::AMOUNT)?;
        let amount = amount_text.trim().parse::<f64>().map_err(|err| {
            LongboardError::record(column::AMOUNT, format!("`{amount_text}`: {err}"))
        })?;
        if !amount.is_finite() {
            return Err(LongboardError::record(
                column::AMOUNT,
                format!("`{amount_text}` is not a finite number"),
            ));
        }
        let buyer_reference = record
            .get(column::BUYER_REFERENCE)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        Ok(Self {
            reference: required(record, column::REFERENCE)?.to_owned(),
            amount,
            description: required(record, column::DESCRIPTION)?.to_owned(),
            date_posted: report_date(record, column::DATE)?,
            date_due: report_date(record, column::DATE_DUE)?,
            kind: required(record, column::TYPE)?.to_owned(),
            sub_kind: required(record, column::SUBTYPE)?.to_owned(),
            buyer_reference,
            raw: record.clone(),
        })
    }

    /// Key used by the product and account mapping tables.
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> String {
        format!("{}-{}", self.kind, self.sub_kind)
    }

    /// The source row as a JSON object, for embedding in memos.
    #[must_use]
    pub fn raw_json(&self) -> Value {
        Value::Object(
            self.raw
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        )
    }
}

/// Looks up a required column.
fn required<'rec>(record: &'rec Record, field: &'static str) -> Result<&'rec str> {
    record
        .get(field)
        .map(String::as_str)
        .ok_or_else(|| LongboardError::record(field, "missing"))
}

/// Parses a required report date column.
fn report_date(record: &Record, field: &'static str) -> Result<NaiveDate> {
    let text = required(record, field)?;
    NaiveDate::parse_from_str(text.trim(), REPORT_DATE_FORMAT)
        .map_err(|err| LongboardError::record(field, format!("`{text}`: {err}")))
}

/// A team (company) the freelancer works for.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTeam {
    /// Team reference, the durable join key to a Wave customer.
    pub reference: String,
    /// Company name.
    pub company_name: String,
    /// Contact name.
    pub name: String,
    /// The full record as received.
    pub raw: Value,
}

impl SourceTeam {
    /// Builds a team from a raw JSON record.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Record`] if the value is not an object
    /// or lacks a `reference` or `company_name`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(LongboardError::record("team", "expected a JSON object"));
        };
        let reference = text_field(object, "reference")?
            .ok_or_else(|| LongboardError::record("reference", "missing"))?;
        let company_name = text_field(object, "company_name")?
            .ok_or_else(|| LongboardError::record("company_name", "missing"))?;
        let name = text_field(object, "name")?.unwrap_or_default();
        Ok(Self {
            reference,
            company_name,
            name,
            raw: value,
        })
    }
}

/// Reads a string or numeric field as text.
fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    let Some(value) = object.get(field).filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    if let Some(text) = value.as_str() {
        Ok(Some(text.to_owned()))
    } else if value.is_number() {
        Ok(Some(value.to_string()))
    } else {
        Err(LongboardError::record(field, "expected text"))
    }
}
