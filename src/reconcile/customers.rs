//! Customer reconciliation: one Wave customer per Upwork team.
//!
//! Teams are joined to customers on `display_id == team.reference`. A
//! matched customer gets the team record merged into its internal notes;
//! an unmatched team becomes a new customer.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{SOURCE_KEY, source_memo};
use crate::error::Result;
use crate::models::{Business, Customer, MutationOutcome, SourceTeam};
use crate::platform::DestinationPlatform;

/// Converts a source team into a not-yet-created Wave customer.
///
/// The contact name is split on its first run of whitespace into first and
/// last name; a single-word name leaves the last name empty.
#[must_use]
pub fn team_to_customer(team: &SourceTeam) -> Customer {
    let contact = team.name.trim();
    let (first_name, last_name) = contact
        .split_once(char::is_whitespace)
        .map_or((contact, ""), |(first, rest)| (first, rest.trim_start()));
    Customer {
        display_id: Some(team.reference.clone()),
        name: team.company_name.clone(),
        first_name: Some(first_name.to_owned()),
        last_name: Some(last_name.to_owned()),
        internal_notes: Some(source_memo(team.raw.clone())),
        ..Customer::default()
    }
}

/// Merges `raw` into existing notes under the source key.
///
/// Blank notes, notes that are not JSON, and JSON that is not an object all
/// start over from an empty object. Other keys are preserved.
#[must_use]
pub fn merge_notes(notes: Option<&str>, raw: &Value) -> String {
    let mut object = notes
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Array(_) => None,
        })
        .unwrap_or_else(Map::new);
    let _old = object.insert(SOURCE_KEY.to_owned(), raw.clone());
    format!("{:#}", Value::Object(object))
}

/// Result of one customer reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerReport {
    /// Customers as Wave returned them after create or patch.
    pub customers: Vec<Customer>,
    /// Number of customers created.
    pub created: usize,
    /// Number of customers patched.
    pub updated: usize,
    /// Number of teams whose mutation failed.
    pub failed: usize,
}

/// Persisted customers indexed by display id.
#[derive(Debug, Clone, Default)]
pub struct CustomerDirectory {
    /// Customers keyed by `display_id`.
    by_display_id: BTreeMap<String, Customer>,
}

impl CustomerDirectory {
    /// Builds a directory from `existing` customers overlaid with
    /// `resolved` ones.
    ///
    /// Customers without a display id or a Wave id are left out.
    #[must_use]
    pub fn new(existing: &[Customer], resolved: &[Customer]) -> Self {
        let by_display_id = existing
            .iter()
            .chain(resolved)
            .filter(|customer| customer.is_persisted())
            .filter_map(|customer| {
                customer
                    .display_id
                    .clone()
                    .map(|display_id| (display_id, customer.clone()))
            })
            .collect();
        Self { by_display_id }
    }

    /// Looks up the customer for a team reference.
    #[inline]
    #[must_use]
    pub fn get(&self, display_id: &str) -> Option<&Customer> {
        self.by_display_id.get(display_id)
    }

    /// Number of customers in the directory.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_display_id.len()
    }

    /// Returns `true` if the directory holds no customers.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_display_id.is_empty()
    }
}

/// Creates or patches Wave customers from Upwork teams.
#[derive(Debug)]
pub struct CustomerReconciler<'dest, D: ?Sized> {
    /// Wave collaborator.
    destination: &'dest D,
}

impl<'dest, D: DestinationPlatform + ?Sized> CustomerReconciler<'dest, D> {
    /// Creates a reconciler writing to `destination`.
    #[inline]
    #[must_use]
    pub const fn new(destination: &'dest D) -> Self {
        Self { destination }
    }

    /// Reconciles `teams` against the `existing` customers of `business`.
    ///
    /// Failed mutations are logged and counted; they never abort the pass.
    #[tracing::instrument(skip_all, fields(business = %business.id, teams = teams.len()))]
    pub fn reconcile(
        &self,
        business: &Business,
        teams: &[SourceTeam],
        existing: &[Customer],
    ) -> CustomerReport {
        let mut report = CustomerReport::default();
        for team in teams {
            let matched = existing
                .iter()
                .find(|customer| customer.display_id.as_deref() == Some(team.reference.as_str()));
            if let Some(customer) = matched {
                let mut patched = customer.clone();
                patched.internal_notes = Some(merge_notes(
                    customer.internal_notes.as_deref(),
                    &team.raw,
                ));
                let result = self.destination.patch_customer(&patched.patch_input());
                match settle(&team.reference, "patch", result) {
                    Some(saved) => {
                        report.updated += 1;
                        report.customers.push(saved);
                    }
                    None => report.failed += 1,
                }
            } else {
                let customer = team_to_customer(team);
                let result = self
                    .destination
                    .create_customer(&customer.create_input(&business.id));
                match settle(&team.reference, "create", result) {
                    Some(created) => {
                        report.created += 1;
                        report.customers.push(created);
                    }
                    None => report.failed += 1,
                }
            }
        }
        tracing::info!(
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "customers reconciled"
        );
        report
    }
}

/// Unwraps a customer mutation, logging why it yielded nothing.
fn settle(
    display_id: &str,
    action: &str,
    result: Result<MutationOutcome<Customer>>,
) -> Option<Customer> {
    match result {
        Ok(outcome) if outcome.did_succeed => {
            if outcome.entity.is_none() {
                tracing::warn!(display_id, "customer {action} returned no customer");
            }
            outcome.entity
        }
        Ok(outcome) => {
            tracing::warn!(
                display_id,
                errors = %outcome.error_summary(),
                "customer {action} rejected"
            );
            None
        }
        Err(err) => {
            tracing::warn!(display_id, error = %err, "customer {action} failed");
            None
        }
    }
}
