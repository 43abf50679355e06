//! Cross-field constraints.
//!
//! An exclusive group limits how many of a set of fields may carry a value at
//! once. A field counts as present when its value is not null, not unknown and
//! not an empty string.
//!
//! Policy:
//! - `requires_one = true`: exactly one field must be present.
//! - `requires_one = false`: at most one field may be present; none is fine.

use crate::rule::Violation;
use crate::value::{Record, Value};
use serde::Serialize;

/// A named set of mutually exclusive fields.
#[derive(Debug, Clone, Serialize)]
pub struct ExclusiveGroup {
    pub fields: Vec<&'static str>,
    pub requires_one: bool,
}

impl ExclusiveGroup {
    /// At most one of `fields` may be set.
    pub fn at_most_one(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
            requires_one: false,
        }
    }

    /// Exactly one of `fields` must be set.
    pub fn exactly_one(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
            requires_one: true,
        }
    }

    /// Check the group against a record.
    pub fn validate(&self, record: &Record) -> Vec<Violation> {
        validate_group(&self.fields, |field| record.get(field), self.requires_one)
    }

    pub fn description(&self) -> String {
        let quantifier = if self.requires_one {
            "exactly one of"
        } else {
            "at most one of"
        };
        format!("{quantifier} [{}]", self.fields.join(", "))
    }
}

/// Count the present fields in `fields` and report a violation when the count
/// breaks the group policy.
///
/// The violation is attributed to the first field of the group.
pub fn validate_group<'a>(
    fields: &[&str],
    values: impl Fn(&str) -> &'a Value,
    requires_one: bool,
) -> Vec<Violation> {
    let present: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| values(field).is_present())
        .collect();

    let anchor = fields.first().copied().unwrap_or_default();
    let listing = fields.join(", ");

    if requires_one && present.is_empty() {
        return vec![Violation::new(
            anchor,
            "one field is required",
            format!("exactly one of [{listing}] must be set"),
        )];
    }

    if present.len() > 1 {
        return vec![Violation::new(
            anchor,
            "only one field is allowed",
            format!(
                "at most one of [{listing}] may be set, found [{}]",
                present.join(", ")
            ),
        )];
    }

    Vec::new()
}
