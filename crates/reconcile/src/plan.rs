//! Transition decision and field-level change preview.

use crate::identity::EntityKind;
use crate::schema::schema;
use crate::state::CanonicalState;
use rules::{Record, Value};
use serde::Serialize;
use std::fmt;

/// The one operation reconciling prior and desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Create a new remote entity.
    Create,
    /// Take over an existing remote entity by uuid, then rotate its credentials.
    Adopt,
    /// Update the bound entity.
    Update,
    /// Hide the bound entity.
    SoftDelete,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Adopt => "adopt",
            Self::Update => "update",
            Self::SoftDelete => "soft-delete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the transition for a prior state and a desired record.
///
/// Returns `None` when there is neither a prior state nor a desired record.
pub fn decide(prior: Option<&CanonicalState>, desired: Option<&Record>) -> Option<Transition> {
    match (prior, desired) {
        (None, Some(desired)) if desired.str("uuid").is_some() => Some(Transition::Adopt),
        (None, Some(_)) => Some(Transition::Create),
        (Some(_), Some(_)) => Some(Transition::Update),
        (Some(_), None) => Some(Transition::SoftDelete),
        (None, None) => None,
    }
}

/// One field whose value will change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.before, self.after)
    }
}

/// Field changes a transition would make.
///
/// Only input fields that carry a desired value are compared. Computed fields
/// show up as unknown until the remote assigns them.
pub fn changes(
    kind: EntityKind,
    transition: Transition,
    prior: Option<&Record>,
    desired: Option<&Record>,
) -> Vec<FieldChange> {
    let schema = schema(kind);
    let empty = Record::new();
    let prior = prior.unwrap_or(&empty);

    if transition == Transition::SoftDelete {
        return match prior.get("public") {
            Value::Bool(false) => Vec::new(),
            before => vec![FieldChange {
                field: "public".to_string(),
                before: before.clone(),
                after: Value::Bool(false),
            }],
        };
    }

    let desired = desired.unwrap_or(&empty);
    let mut out: Vec<FieldChange> = schema
        .inputs()
        .filter(|f| desired.contains(f.name))
        .filter(|f| prior.get(f.name) != desired.get(f.name))
        .map(|f| FieldChange {
            field: f.name.to_string(),
            before: prior.get(f.name).clone(),
            after: desired.get(f.name).clone(),
        })
        .collect();

    if matches!(transition, Transition::Create | Transition::Adopt) {
        out.extend(
            schema
                .fields
                .iter()
                .filter(|f| !f.is_input() && !desired.contains(f.name))
                .map(|f| FieldChange {
                    field: f.name.to_string(),
                    before: Value::Null,
                    after: Value::Unknown,
                }),
        );
    }

    out
}

/// A decided transition with its field-level preview.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub kind: EntityKind,
    pub transition: Transition,
    pub changes: Vec<FieldChange>,
}

impl Plan {
    /// Decide and preview the transition, or `None` when there is nothing to do.
    ///
    /// `desired` should already carry defaults for a create.
    pub fn build(
        kind: EntityKind,
        prior: Option<&CanonicalState>,
        desired: Option<&Record>,
    ) -> Option<Self> {
        let transition = decide(prior, desired)?;
        let changes = changes(kind, transition, prior.map(|p| &p.fields), desired);
        Some(Self {
            kind,
            transition,
            changes,
        })
    }

    /// Whether applying the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self.transition, Transition::Update | Transition::SoftDelete)
            && self.changes.is_empty()
    }
}
