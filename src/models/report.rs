//! Tabular report responses and their flattening into records.
//!
//! Upwork's finance reports answer in the Google Visualization table
//! shape: a `cols` array of labelled columns and a `rows` array whose
//! `c` entries hold one `{ "v": ... }` cell per column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single flattened report row keyed by column label.
pub type Record = BTreeMap<String, String>;

/// Envelope of a tabular report response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    /// The table, absent when the report has nothing to say.
    #[serde(default)]
    pub table: Option<ReportTable>,
}

/// Column headings plus rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    /// Column definitions, in cell order.
    #[serde(default)]
    pub cols: Vec<ReportColumn>,
    /// Data rows.
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

/// A column definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    /// Column label, used as the record key.
    #[serde(default)]
    pub label: String,
}

/// A data row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Cells, positionally matched to [`ReportTable::cols`].
    #[serde(default)]
    pub c: Vec<Option<ReportCell>>,
}

/// A single cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCell {
    /// Raw cell value.
    #[serde(default)]
    pub v: serde_json::Value,
}

impl ReportCell {
    /// Renders the cell value as the string stored in a [`Record`].
    ///
    /// Strings are taken verbatim, `null` becomes the empty string and
    /// anything else is rendered as JSON text.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> String {
        if let Some(text) = self.v.as_str() {
            text.to_owned()
        } else if self.v.is_null() {
            String::new()
        } else {
            self.v.to_string()
        }
    }
}

/// Flattens a tabular response into one record per row, in row order.
///
/// A response without a `table` yields no records. Cells beyond the
/// number of columns are ignored; missing cells are simply absent from
/// the record.
#[must_use]
pub fn flatten(response: &ReportResponse) -> Vec<Record> {
    let Some(table) = response.table.as_ref() else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .map(|row| {
            table
                .cols
                .iter()
                .zip(row.c.iter())
                .map(|(col, cell)| {
                    let value = cell.as_ref().map(ReportCell::as_text).unwrap_or_default();
                    (col.label.clone(), value)
                })
                .collect()
        })
        .collect()
}
