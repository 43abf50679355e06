//! Canonical state: what the remote confirmed after the last operation.

use crate::identity::{EntityKind, Identity};
use chrono::{DateTime, Utc};
use remote::Credentials;
use rules::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where an entity stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    /// No remote entity known.
    Unbound,
    /// Bound to a remote entity.
    Bound,
    /// Bound, but hidden from the public.
    SoftDeleted,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unbound => "unbound",
            Self::Bound => "bound",
            Self::SoftDeleted => "soft-deleted",
        };
        write!(f, "{s}")
    }
}

/// Remote-confirmed state of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalState {
    pub identity: Identity,
    pub fields: Record,
    /// Credentials from creation or the last rotation. Never re-read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalState {
    /// Build a state for the entity bound to `external_id`.
    pub fn new(
        identity: Identity,
        external_id: Uuid,
        fields: Record,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            identity: identity.with_external_id(external_id),
            fields,
            credentials,
            updated_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.identity.kind
    }

    pub fn external_id(&self) -> Option<Uuid> {
        self.identity.external_id
    }

    pub fn binding(&self) -> Binding {
        if self.identity.external_id.is_none() {
            Binding::Unbound
        } else if self.fields.bool("public") == Some(false) {
            Binding::SoftDeleted
        } else {
            Binding::Bound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(public: bool) -> CanonicalState {
        CanonicalState::new(
            Identity::new(EntityKind::Provider),
            Uuid::new_v4(),
            Record::new().with("name", "Acme").with("public", public),
            Some(Credentials::new("ak", "sk")),
        )
    }

    #[test]
    fn test_new_binds_identity() {
        let state = state(true);
        assert!(state.external_id().is_some());
        assert_eq!(state.binding(), Binding::Bound);
        assert_eq!(state.kind(), EntityKind::Provider);
    }

    #[test]
    fn test_hidden_entity_is_soft_deleted() {
        assert_eq!(state(false).binding(), Binding::SoftDeleted);
    }

    #[test]
    fn test_unbound_without_external_id() {
        let mut state = state(true);
        state.identity.external_id = None;
        assert_eq!(state.binding(), Binding::Unbound);
    }

    #[test]
    fn test_serde_roundtrip_keeps_credentials() {
        let state = state(true);
        let json = serde_json::to_string_pretty(&state).unwrap();
        assert!(json.contains("\"api_key\": \"ak\""));
        let parsed: CanonicalState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
