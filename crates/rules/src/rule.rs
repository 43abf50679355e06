//! Single-field validation rules.
//!
//! A [`Rule`] inspects one raw [`Value`] and reports every [`Violation`] it
//! finds. Rules never perform I/O and never judge a value that is not known
//! yet. Each rule reports at most one violation per value: the first failing
//! check wins.

use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Largest value accepted by [`BoundedInt`] (unsigned 32-bit range).
pub const U32_CEILING: i64 = 4_294_967_295;

/// Longest accepted alt id.
pub const ALT_ID_MAX_LEN: usize = 50;

static ALT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid regex"));

/// A field-level rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the offending field
    pub field: String,
    /// Short summary, e.g. "invalid alt_id"
    pub summary: String,
    /// Human-readable reason
    pub detail: String,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

/// A validation rule for one field.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Human-readable description, shown in schema listings.
    fn description(&self) -> String;

    /// Check `value` for the field named `field`.
    fn validate(&self, field: &str, value: &Value) -> Vec<Violation>;
}

/// Boxed rule for use in field tables.
pub type BoxedRule = Box<dyn Rule>;

// ============================================================================
// Shared input handling
// ============================================================================

enum Input<'a> {
    /// Value not known yet
    Skip,
    /// Null or empty string
    Missing,
    Text(&'a str),
    Number(i64),
    Wrong(&'static str),
}

fn classify(value: &Value) -> Input<'_> {
    match value {
        Value::Unknown => Input::Skip,
        Value::Null => Input::Missing,
        Value::Str(s) if s.is_empty() => Input::Missing,
        Value::Str(s) => Input::Text(s),
        Value::Int(n) => Input::Number(*n),
        Value::Bool(_) => Input::Wrong("bool"),
    }
}

fn one(violation: Option<Violation>) -> Vec<Violation> {
    violation.into_iter().collect()
}

fn missing(field: &str, required: bool) -> Vec<Violation> {
    if required {
        vec![Violation::new(
            field,
            format!("{field} cannot be empty"),
            format!("{field} is required but no value was provided"),
        )]
    } else {
        Vec::new()
    }
}

fn wrong_type(field: &str, expected: &str, found: &str) -> Vec<Violation> {
    vec![Violation::new(
        field,
        format!("invalid {field}"),
        format!("expected a {expected}, found {found}"),
    )]
}

/// Run `check` on a text value, applying the shared presence rules first.
fn text_rule(
    field: &str,
    value: &Value,
    required: bool,
    check: impl FnOnce(&str) -> Option<String>,
) -> Vec<Violation> {
    match classify(value) {
        Input::Skip => Vec::new(),
        Input::Missing => missing(field, required),
        Input::Number(_) => wrong_type(field, "string", "integer"),
        Input::Wrong(found) => wrong_type(field, "string", found),
        Input::Text(s) => one(check(s).map(|detail| {
            Violation::new(field, format!("invalid {field}"), detail)
        })),
    }
}

// ============================================================================
// Format checks
// ============================================================================

/// Reason an alt id is malformed, if it is.
pub fn check_alt_id(value: &str) -> Option<String> {
    if !ALT_ID_RE.is_match(value) {
        return Some("must be lower snake case ([a-z0-9_])".to_string());
    }
    if value.len() > ALT_ID_MAX_LEN {
        return Some(format!("must be at most {ALT_ID_MAX_LEN} characters"));
    }
    if value.starts_with('_') {
        return Some("cannot start with an underscore".to_string());
    }
    if value.ends_with('_') {
        return Some("cannot end with an underscore".to_string());
    }
    None
}

fn check_uuid(value: &str) -> Option<String> {
    uuid::Uuid::parse_str(value)
        .err()
        .map(|e| format!("{value:?} is not a valid UUID: {e}"))
}

/// Accepts any URI with a scheme, opaque ones included, or an absolute path.
fn check_url(value: &str) -> Option<String> {
    if value.starts_with('/') {
        return url::Url::parse(&format!("http://localhost{value}"))
            .err()
            .map(|e| format!("{value:?} is not a valid path: {e}"));
    }
    url::Url::parse(value)
        .err()
        .map(|e| format!("{value:?} is not a valid URL: {e}"))
}

fn check_color(value: &str) -> Option<String> {
    if value.chars().count() != 7 {
        return Some("must be exactly 7 characters long".to_string());
    }
    let Some(hex) = value.strip_prefix('#') else {
        return Some("must start with '#'".to_string());
    };
    if !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return Some("must be '#' followed by 6 lowercase hex digits".to_string());
    }
    None
}

// ============================================================================
// Rules
// ============================================================================

/// Lower snake case identifier, unique within its parent.
#[derive(Debug, Clone, Copy)]
pub struct AltId {
    pub required: bool,
}

impl Rule for AltId {
    fn description(&self) -> String {
        "lower snake case alt id, 1-50 characters, no leading or trailing underscore".to_string()
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.required, check_alt_id)
    }
}

/// Standard UUID.
#[derive(Debug, Clone, Copy)]
pub struct Uuid {
    pub required: bool,
}

impl Rule for Uuid {
    fn description(&self) -> String {
        "UUID".to_string()
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.required, check_uuid)
    }
}

/// URL with a scheme, or an absolute path.
#[derive(Debug, Clone, Copy)]
pub struct Url {
    pub required: bool,
}

impl Rule for Url {
    fn description(&self) -> String {
        "URL or absolute path".to_string()
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.required, check_url)
    }
}

/// `#rrggbb` color with lowercase hex digits.
#[derive(Debug, Clone, Copy)]
pub struct Color {
    pub required: bool,
}

impl Rule for Color {
    fn description(&self) -> String {
        "hex color (#rrggbb, lowercase)".to_string()
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.required, check_color)
    }
}

/// Billing recurrence. Always required.
#[derive(Debug, Clone, Copy)]
pub struct Recurrence;

impl Recurrence {
    pub const VALUES: [&'static str; 4] = ["lifetime", "yearly", "monthly", "weekly"];
}

impl Rule for Recurrence {
    fn description(&self) -> String {
        format!("one of {}", Self::VALUES.join(", "))
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, true, |s| {
            (!Self::VALUES.contains(&s))
                .then(|| format!("{s:?} must be one of {}", Self::VALUES.join(", ")))
        })
    }
}

/// Integer within `[floor, u32::MAX]`.
#[derive(Debug, Clone, Copy)]
pub struct BoundedInt {
    pub floor: i64,
}

impl Rule for BoundedInt {
    fn description(&self) -> String {
        format!("integer between {} and {U32_CEILING}", self.floor)
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        match classify(value) {
            Input::Skip => Vec::new(),
            Input::Missing => missing(field, true),
            Input::Text(_) => wrong_type(field, "integer", "string"),
            Input::Wrong(found) => wrong_type(field, "integer", found),
            Input::Number(n) if n > U32_CEILING => vec![Violation::new(
                field,
                format!("invalid {field}"),
                format!("{n} exceeds the maximum of {U32_CEILING}"),
            )],
            Input::Number(n) if n < self.floor => vec![Violation::new(
                field,
                format!("invalid {field}"),
                format!("{n} is below the minimum of {}", self.floor),
            )],
            Input::Number(_) => Vec::new(),
        }
    }
}

/// String length in characters within `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Length {
    pub min: usize,
    pub max: usize,
}

impl Rule for Length {
    fn description(&self) -> String {
        format!("{}-{} characters", self.min, self.max)
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.min > 0, |s| {
            let len = s.chars().count();
            (len < self.min || len > self.max).then(|| {
                format!(
                    "length must be between {} and {} characters, got {len}",
                    self.min, self.max
                )
            })
        })
    }
}

/// Either a UUID or a valid alt id.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub required: bool,
}

impl Rule for Reference {
    fn description(&self) -> String {
        "UUID or alt id".to_string()
    }

    fn validate(&self, field: &str, value: &Value) -> Vec<Violation> {
        text_rule(field, value, self.required, |s| {
            if uuid::Uuid::parse_str(s).is_ok() {
                return None;
            }
            check_alt_id(s)
                .map(|reason| format!("{s:?} is neither a UUID nor a valid alt id ({reason})"))
        })
    }
}
