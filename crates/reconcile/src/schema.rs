//! Field tables for each entity kind.
//!
//! A [`Schema`] lists every field a kind accepts or produces, how it is
//! supplied (required, optional or computed by the remote), its type, its
//! default and the rules that check it. Exclusive groups add constraints that
//! span several fields.
//!
//! Validation runs in two passes. Field rules come first and any violation
//! aborts with [`Error::Validation`]. Only a field-valid record reaches the
//! exclusive groups, which report [`Error::Constraint`].

use crate::error::{Error, Result};
use crate::identity::EntityKind;
use rules::{
    AltId, BoundedInt, BoxedRule, Color, ExclusiveGroup, Length, Record, Recurrence, Reference,
    Url, Uuid, Value, Violation,
};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// How a field is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Must be supplied on create.
    Required,
    /// May be supplied.
    Optional,
    /// Set by the remote system; never accepted as input.
    Computed,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Computed => "computed",
        };
        write!(f, "{s}")
    }
}

/// Type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
}

impl FieldType {
    /// Whether `value` has this type. Null and unknown values match any type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null | Value::Unknown) => true,
            (Self::String, Value::Str(_)) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "integer",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a field table.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub presence: Presence,
    pub ty: FieldType,
    /// Secret output; never shown or accepted as input.
    pub sensitive: bool,
    /// Fixed at creation.
    pub immutable: bool,
    pub default: Option<Value>,
    pub rules: Vec<BoxedRule>,
    pub description: &'static str,
}

impl FieldSpec {
    fn new(name: &'static str, presence: Presence, ty: FieldType) -> Self {
        Self {
            name,
            presence,
            ty,
            sensitive: false,
            immutable: false,
            default: None,
            rules: Vec::new(),
            description: "",
        }
    }

    pub fn required(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, Presence::Required, ty)
    }

    pub fn optional(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, Presence::Optional, ty)
    }

    pub fn computed(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, Presence::Computed, ty)
    }

    pub fn rule(mut self, rule: impl rules::Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn is_input(&self) -> bool {
        self.presence != Presence::Computed
    }

    /// Run this field's own checks against `value`.
    fn check(&self, value: &Value, mode: Mode) -> Vec<Violation> {
        let name = self.name;

        if value.is_unknown() {
            return Vec::new();
        }

        if !self.is_input() {
            if value.is_null() {
                return Vec::new();
            }
            let detail = if self.sensitive {
                format!("{name} is issued by the remote system and cannot be supplied")
            } else {
                format!("{name} is computed by the remote system and cannot be supplied")
            };
            return vec![Violation::new(name, format!("{name} is read-only"), detail)];
        }

        if !self.ty.accepts(value) {
            return vec![Violation::new(
                name,
                format!("invalid {name}"),
                format!("expected a {}, found {}", self.ty, value.type_name()),
            )];
        }

        if !value.is_present() {
            // An update leaves null fields alone, but a supplied empty value
            // would clear a required field.
            let missing = match mode {
                Mode::Create => true,
                Mode::Update => !value.is_null(),
            };
            return if missing && self.presence == Presence::Required {
                vec![Violation::new(
                    name,
                    format!("{name} cannot be empty"),
                    format!("{name} is required but no value was provided"),
                )]
            } else {
                Vec::new()
            };
        }

        self.rules
            .iter()
            .flat_map(|rule| rule.validate(name, value))
            .collect()
    }
}

/// Whether a record describes a new entity or changes to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every required field must be present.
    Create,
    /// Only the supplied fields are checked.
    Update,
}

/// Field table and exclusive groups for one entity kind.
#[derive(Debug)]
pub struct Schema {
    pub kind: EntityKind,
    pub fields: Vec<FieldSpec>,
    pub groups: Vec<ExclusiveGroup>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields a desired record may carry.
    pub fn inputs(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_input())
    }

    /// Names of the sensitive fields.
    pub fn sensitive_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.sensitive).map(|f| f.name)
    }

    /// Copy of `record` with defaults filled in for absent fields.
    pub fn with_defaults(&self, record: &Record) -> Record {
        let mut filled = record.clone();
        for field in &self.fields {
            if let Some(default) = &field.default
                && record.get(field.name).is_null()
            {
                filled.set(field.name, default.clone());
            }
        }
        filled
    }

    /// Check a record against the field table, then against the exclusive groups.
    pub fn validate(&self, record: &Record, mode: Mode) -> Result<()> {
        let mut violations: Vec<Violation> = record
            .keys()
            .filter(|name| self.field(name).is_none())
            .map(|name| {
                Violation::new(
                    name,
                    format!("unknown field {name}"),
                    format!("{name} is not a field of a {}", self.kind),
                )
            })
            .collect();

        for field in &self.fields {
            violations.extend(field.check(record.get(field.name), mode));
        }

        if !violations.is_empty() {
            log::debug!("{} failed validation: {} violations", self.kind, violations.len());
            return Err(Error::Validation(violations));
        }

        let violations: Vec<Violation> = self
            .groups
            .iter()
            .flat_map(|group| group.validate(record))
            .collect();
        if !violations.is_empty() {
            return Err(Error::Constraint(violations));
        }

        Ok(())
    }

    /// The input fields of `record` that carry a value, excluding immutable ones.
    pub fn patch(&self, record: &Record) -> Record {
        self.inputs()
            .filter(|f| !f.immutable)
            .filter(|f| record.is_present(f.name))
            .map(|f| (f.name.to_string(), record.get(f.name).clone()))
            .collect()
    }

    /// Immutable fields whose desired value differs from the recorded one.
    pub fn immutable_changes(&self, prior: &Record, desired: &Record) -> Vec<Violation> {
        self.fields
            .iter()
            .filter(|f| f.immutable)
            .filter(|f| prior.is_present(f.name) && desired.is_present(f.name))
            .filter(|f| prior.get(f.name) != desired.get(f.name))
            .map(|f| {
                Violation::new(
                    f.name,
                    format!("{} cannot change", f.name),
                    format!(
                        "{} is fixed at creation ({} -> {})",
                        f.name,
                        prior.get(f.name),
                        desired.get(f.name)
                    ),
                )
            })
            .collect()
    }
}

// ============================================================================
// Field tables
// ============================================================================

const DEFAULT_COLOR: &str = "#a0a0a0";

fn name_field() -> FieldSpec {
    FieldSpec::required("name", FieldType::String)
        .rule(Length { min: 1, max: 100 })
        .describe("Display name")
}

fn description_field() -> FieldSpec {
    FieldSpec::required("description", FieldType::String)
        .rule(Length { min: 3, max: 500 })
        .describe("Short description")
}

fn id_fields() -> [FieldSpec; 2] {
    [
        FieldSpec::computed("id", FieldType::String).describe("Remote identifier"),
        FieldSpec::computed("uuid", FieldType::String).describe("Remote UUID"),
    ]
}

static PROVIDER: LazyLock<Schema> = LazyLock::new(|| Schema {
    kind: EntityKind::Provider,
    fields: vec![
        FieldSpec::computed("id", FieldType::String).describe("Remote identifier"),
        FieldSpec::optional("uuid", FieldType::String)
            .rule(Uuid { required: false })
            .describe("UUID of an existing profile to adopt"),
        FieldSpec::optional("alt_id", FieldType::String)
            .rule(AltId { required: false })
            .describe("Human-chosen identifier"),
        name_field(),
        description_field(),
        FieldSpec::optional("logo_url", FieldType::String)
            .rule(Url { required: false })
            .describe("Logo image URL"),
        FieldSpec::optional("banner_url", FieldType::String)
            .rule(Url { required: false })
            .describe("Banner image URL"),
        FieldSpec::optional("url", FieldType::String)
            .rule(Url { required: false })
            .describe("Homepage URL"),
        FieldSpec::optional("color", FieldType::String)
            .rule(Color { required: false })
            .default_value(DEFAULT_COLOR)
            .describe("Brand color"),
        FieldSpec::optional("public", FieldType::Bool)
            .default_value(true)
            .describe("Listed publicly"),
        FieldSpec::optional("account_service", FieldType::Bool)
            .default_value(true)
            .describe("Offers account services"),
        FieldSpec::computed("api_key", FieldType::String)
            .sensitive()
            .describe("API key, issued once"),
        FieldSpec::computed("secret_key", FieldType::String)
            .sensitive()
            .describe("Secret key, issued once"),
    ],
    groups: vec![ExclusiveGroup::at_most_one(&["uuid", "alt_id"])],
});

static SCRIPT_GROUP: LazyLock<Schema> = LazyLock::new(|| {
    let mut fields: Vec<FieldSpec> = id_fields().into();
    fields.extend([
        FieldSpec::required("provider_id", FieldType::String)
            .rule(Uuid { required: true })
            .describe("UUID of the owning provider profile"),
        FieldSpec::required("alt_id", FieldType::String)
            .rule(AltId { required: true })
            .describe("Identifier unique within the provider"),
        name_field(),
        description_field(),
        FieldSpec::required("public", FieldType::Bool).describe("Listed publicly"),
    ]);
    Schema {
        kind: EntityKind::ScriptGroup,
        fields,
        groups: Vec::new(),
    }
});

static SCRIPT: LazyLock<Schema> = LazyLock::new(|| {
    let mut fields: Vec<FieldSpec> = id_fields().into();
    fields.extend([
        FieldSpec::required("provider_id", FieldType::String)
            .rule(Uuid { required: true })
            .describe("UUID of the owning provider profile"),
        FieldSpec::required("script_group_id", FieldType::String)
            .rule(Reference { required: true })
            .describe("UUID or alt id of the script group"),
        FieldSpec::required("alt_id", FieldType::String)
            .rule(AltId { required: true })
            .describe("Identifier unique within the group"),
        name_field(),
        description_field(),
        FieldSpec::required("recurrence", FieldType::String)
            .rule(Recurrence)
            .immutable()
            .describe("Billing recurrence"),
        FieldSpec::required("price_in_cents", FieldType::Int)
            .rule(BoundedInt { floor: 1 })
            .describe("Price per recurrence in cents"),
        FieldSpec::required("sla_sec", FieldType::Int)
            .rule(BoundedInt { floor: 2400 })
            .describe("Service level agreement in seconds"),
        FieldSpec::required("token_lifetime_sec", FieldType::Int)
            .rule(BoundedInt { floor: 600 })
            .describe("Access token lifetime in seconds"),
        FieldSpec::required("public", FieldType::Bool).describe("Listed publicly"),
    ]);
    Schema {
        kind: EntityKind::Script,
        fields,
        groups: Vec::new(),
    }
});

/// Field table for `kind`.
pub fn schema(kind: EntityKind) -> &'static Schema {
    match kind {
        EntityKind::Provider => &PROVIDER,
        EntityKind::ScriptGroup => &SCRIPT_GROUP,
        EntityKind::Script => &SCRIPT,
    }
}

impl EntityKind {
    /// Field table for this kind.
    pub fn schema(&self) -> &'static Schema {
        schema(*self)
    }
}
