//! Result shape of Wave create/patch mutations.

use serde::{Deserialize, Serialize};

/// A validation error reported by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputError {
    /// Path of the offending input field.
    #[serde(default)]
    pub path: Vec<String>,
    /// Human readable message.
    pub message: String,
    /// Machine readable code.
    #[serde(default)]
    pub code: Option<String>,
}

impl core::fmt::Display for InputError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// Outcome of a create or patch mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome<T> {
    /// Whether Wave accepted the mutation.
    pub did_succeed: bool,
    /// Validation errors when it did not.
    #[serde(default)]
    pub input_errors: Vec<InputError>,
    /// The created or patched entity.
    pub entity: Option<T>,
}

impl<T> MutationOutcome<T> {
    /// A successful outcome carrying `entity`.
    #[inline]
    #[must_use]
    pub const fn succeeded(entity: T) -> Self {
        Self {
            did_succeed: true,
            input_errors: Vec::new(),
            entity: Some(entity),
        }
    }

    /// A rejected outcome with the given validation errors.
    #[inline]
    #[must_use]
    pub const fn rejected(input_errors: Vec<InputError>) -> Self {
        Self {
            did_succeed: false,
            input_errors,
            entity: None,
        }
    }

    /// The entity if the mutation succeeded and returned one.
    #[inline]
    #[must_use]
    pub fn into_entity(self) -> Option<T> {
        if self.did_succeed { self.entity } else { None }
    }

    /// Validation errors joined into one line for logging.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.input_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
