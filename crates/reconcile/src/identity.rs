//! Entity kinds and the addressing tuple that locates one remote entity.
//!
//! An entity is addressed by exactly one mechanism: its UUID when known,
//! otherwise its alt id within a parent. Provider profiles have no parent and
//! can only be addressed by UUID.

use crate::error::{Error, Result};
use remote::GroupRef;
use rules::{Record, check_alt_id};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The kinds of remote entity this crate manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Account/provider profile, the owner of script groups.
    Provider,
    /// A named group of scripts within a provider.
    ScriptGroup,
    /// A single script within a group.
    Script,
}

impl EntityKind {
    pub const ALL: [Self; 3] = [Self::Provider, Self::ScriptGroup, Self::Script];

    /// Name used in manifests and state files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::ScriptGroup => "script_group",
            Self::Script => "script",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Provider => "provider profile",
            Self::ScriptGroup => "script group",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "provider" => Ok(Self::Provider),
            "script_group" => Ok(Self::ScriptGroup),
            "script" => Ok(Self::Script),
            _ => Err(format!(
                "unknown kind '{s}' (expected provider, script_group or script)"
            )),
        }
    }
}

/// Where an entity lives, resolved from an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Known UUID.
    Id(Uuid),
    /// Script group alt id within a provider.
    Group { provider: Uuid, alt_id: String },
    /// Script alt id within a group.
    Script { group: GroupRef, alt_id: String },
}

/// The addressing tuple for one remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub kind: EntityKind,
    /// Remote UUID, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Uuid>,
    /// Human-chosen key, unique within the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_id: Option<String>,
    /// Parent UUID: the provider of a group, or the group of a script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Parent alt id: a script's group referenced by alt id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_alt_id: Option<String>,
    /// Owning provider of a script, needed to resolve a group alt id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
}

fn parse_uuid(kind: EntityKind, field: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::identity(kind, format!("{field} {value:?} is not a valid UUID: {e}")))
}

fn parse_alt_id(kind: EntityKind, field: &str, value: &str) -> Result<String> {
    match check_alt_id(value) {
        None => Ok(value.to_string()),
        Some(reason) => Err(Error::identity(kind, format!("{field} {value:?} {reason}"))),
    }
}

impl Identity {
    /// An identity that knows nothing but its kind.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            external_id: None,
            alt_id: None,
            parent_id: None,
            parent_alt_id: None,
            owner_id: None,
        }
    }

    /// An identity addressed by UUID only.
    pub fn by_id(kind: EntityKind, id: Uuid) -> Self {
        Self::new(kind).with_external_id(id)
    }

    pub fn with_external_id(mut self, id: Uuid) -> Self {
        self.external_id = Some(id);
        self
    }

    /// Build an identity from a desired (or recorded) field set.
    ///
    /// Malformed UUIDs and alt ids are identity errors.
    pub fn from_record(kind: EntityKind, record: &Record) -> Result<Self> {
        let mut identity = Self::new(kind);

        if let Some(uuid) = record.str("uuid") {
            identity.external_id = Some(parse_uuid(kind, "uuid", uuid)?);
        }
        if let Some(alt_id) = record.str("alt_id") {
            identity.alt_id = Some(parse_alt_id(kind, "alt_id", alt_id)?);
        }

        match kind {
            EntityKind::Provider => {}
            EntityKind::ScriptGroup => {
                if let Some(provider) = record.str("provider_id") {
                    identity.parent_id = Some(parse_uuid(kind, "provider_id", provider)?);
                }
            }
            EntityKind::Script => {
                if let Some(provider) = record.str("provider_id") {
                    identity.owner_id = Some(parse_uuid(kind, "provider_id", provider)?);
                }
                if let Some(group) = record.str("script_group_id") {
                    match Uuid::parse_str(group) {
                        Ok(id) => identity.parent_id = Some(id),
                        Err(_) => {
                            identity.parent_alt_id =
                                Some(parse_alt_id(kind, "script_group_id", group)?);
                        }
                    }
                }
            }
        }

        Ok(identity)
    }

    /// Reference to a script's group.
    pub fn group_ref(&self) -> Result<GroupRef> {
        if let Some(id) = self.parent_id {
            return Ok(GroupRef::Id(id));
        }
        match (&self.parent_alt_id, self.owner_id) {
            (Some(alt_id), Some(provider)) => Ok(GroupRef::AltId {
                provider,
                alt_id: alt_id.clone(),
            }),
            (Some(_), None) => Err(Error::identity(
                self.kind,
                "provider_id is required to resolve a script group by alt id",
            )),
            (None, _) => Err(Error::identity(self.kind, "script_group_id is missing")),
        }
    }

    /// How to reach the entity: by UUID when known, otherwise by parent and alt id.
    pub fn address(&self) -> Result<Address> {
        if let Some(id) = self.external_id {
            return Ok(Address::Id(id));
        }
        self.parent_address()
    }

    /// The parent-relative address, ignoring any known UUID.
    pub fn parent_address(&self) -> Result<Address> {
        match self.kind {
            EntityKind::Provider => Err(Error::identity(
                self.kind,
                "a provider profile can only be addressed by uuid",
            )),
            EntityKind::ScriptGroup => {
                let provider = self
                    .parent_id
                    .ok_or_else(|| Error::identity(self.kind, "provider_id is missing"))?;
                Ok(Address::Group {
                    provider,
                    alt_id: self.require_alt_id()?,
                })
            }
            EntityKind::Script => Ok(Address::Script {
                group: self.group_ref()?,
                alt_id: self.require_alt_id()?,
            }),
        }
    }

    fn require_alt_id(&self) -> Result<String> {
        self.alt_id
            .clone()
            .ok_or_else(|| Error::identity(self.kind, "alt_id is missing"))
    }

    /// Reject desired values that would move the entity to a different address.
    ///
    /// Nested entities cannot change parent or alt id in place. A provider
    /// profile may change its alt id but never its uuid.
    pub fn check_unchanged(&self, desired: &Record) -> Result<()> {
        let moved = |field: &str, from: &dyn fmt::Display, to: &str| {
            Err(Error::identity(
                self.kind,
                format!("{field} cannot change from {from} to {to:?} in place"),
            ))
        };

        if let (Some(id), Some(uuid)) = (self.external_id, desired.str("uuid"))
            && Uuid::parse_str(uuid).ok() != Some(id)
        {
            return moved("uuid", &id, uuid);
        }

        if self.kind == EntityKind::Provider {
            return Ok(());
        }

        if let (Some(current), Some(alt_id)) = (&self.alt_id, desired.str("alt_id"))
            && current != alt_id
        {
            return moved("alt_id", current, alt_id);
        }

        let provider_id = desired.str("provider_id");
        let current_provider = match self.kind {
            EntityKind::ScriptGroup => self.parent_id,
            _ => self.owner_id,
        };
        if let (Some(current), Some(provider)) = (current_provider, provider_id)
            && Uuid::parse_str(provider).ok() != Some(current)
        {
            return moved("provider_id", &current, provider);
        }

        if self.kind == EntityKind::Script
            && let Some(group) = desired.str("script_group_id")
        {
            let same = match (self.parent_id, &self.parent_alt_id) {
                (Some(id), _) if Uuid::parse_str(group).ok() == Some(id) => true,
                (_, Some(alt_id)) if alt_id == group => true,
                (None, None) => true,
                _ => false,
            };
            if !same {
                let current = self
                    .parent_alt_id
                    .clone()
                    .or_else(|| self.parent_id.map(|id| id.to_string()))
                    .unwrap_or_default();
                return moved("script_group_id", &current, group);
            }
        }

        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.external_id {
            return write!(f, "{} {id}", self.kind);
        }
        let alt_id = self.alt_id.as_deref().unwrap_or("?");
        match (self.parent_id, &self.parent_alt_id) {
            (Some(parent), _) => write!(f, "{} {parent}/{alt_id}", self.kind),
            (None, Some(parent)) => write!(f, "{} {parent}/{alt_id}", self.kind),
            (None, None) => write!(f, "{} {alt_id}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDER: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";
    const GROUP: &str = "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8";

    fn provider_uuid() -> Uuid {
        Uuid::parse_str(PROVIDER).unwrap()
    }

    #[test]
    fn test_kind_names() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("widget".parse::<EntityKind>().is_err());
        assert_eq!(EntityKind::ScriptGroup.to_string(), "script group");
    }

    #[test]
    fn test_provider_without_uuid_cannot_be_addressed() {
        let record = Record::new().with("alt_id", "acme");
        let identity = Identity::from_record(EntityKind::Provider, &record).unwrap();
        assert!(matches!(identity.address(), Err(Error::Identity { .. })));
    }

    #[test]
    fn test_provider_by_uuid() {
        let record = Record::new().with("uuid", PROVIDER);
        let identity = Identity::from_record(EntityKind::Provider, &record).unwrap();
        assert_eq!(identity.address().unwrap(), Address::Id(provider_uuid()));
    }

    #[test]
    fn test_malformed_uuid_is_identity_error() {
        let record = Record::new().with("uuid", "nope");
        let err = Identity::from_record(EntityKind::Provider, &record).unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
    }

    #[test]
    fn test_group_addressed_by_provider_and_alt_id() {
        let record = Record::new()
            .with("provider_id", PROVIDER)
            .with("alt_id", "tools");
        let identity = Identity::from_record(EntityKind::ScriptGroup, &record).unwrap();
        assert_eq!(
            identity.address().unwrap(),
            Address::Group {
                provider: provider_uuid(),
                alt_id: "tools".to_string()
            }
        );
    }

    #[test]
    fn test_external_id_wins() {
        let id = Uuid::new_v4();
        let record = Record::new()
            .with("provider_id", PROVIDER)
            .with("alt_id", "tools");
        let identity = Identity::from_record(EntityKind::ScriptGroup, &record)
            .unwrap()
            .with_external_id(id);
        assert_eq!(identity.address().unwrap(), Address::Id(id));
    }

    #[test]
    fn test_script_group_reference_forms() {
        let by_id = Record::new()
            .with("provider_id", PROVIDER)
            .with("script_group_id", GROUP)
            .with("alt_id", "summarize");
        let identity = Identity::from_record(EntityKind::Script, &by_id).unwrap();
        assert!(matches!(identity.group_ref().unwrap(), GroupRef::Id(_)));

        let by_alt = Record::new()
            .with("provider_id", PROVIDER)
            .with("script_group_id", "tools")
            .with("alt_id", "summarize");
        let identity = Identity::from_record(EntityKind::Script, &by_alt).unwrap();
        assert_eq!(
            identity.group_ref().unwrap(),
            GroupRef::AltId {
                provider: provider_uuid(),
                alt_id: "tools".to_string()
            }
        );
    }

    #[test]
    fn test_script_group_alt_id_needs_provider() {
        let record = Record::new()
            .with("script_group_id", "tools")
            .with("alt_id", "summarize");
        let identity = Identity::from_record(EntityKind::Script, &record).unwrap();
        assert!(identity.address().is_err());
    }

    #[test]
    fn test_bad_group_reference_is_identity_error() {
        let record = Record::new().with("script_group_id", "Not Valid");
        assert!(Identity::from_record(EntityKind::Script, &record).is_err());
    }

    #[test]
    fn test_check_unchanged_rejects_alt_id_move() {
        let record = Record::new()
            .with("provider_id", PROVIDER)
            .with("alt_id", "tools");
        let identity = Identity::from_record(EntityKind::ScriptGroup, &record).unwrap();
        assert!(identity.check_unchanged(&record).is_ok());

        let moved = record.clone().with("alt_id", "other");
        assert!(matches!(
            identity.check_unchanged(&moved),
            Err(Error::Identity { .. })
        ));
    }

    #[test]
    fn test_check_unchanged_allows_provider_alt_id_change() {
        let id = provider_uuid();
        let identity = Identity::by_id(EntityKind::Provider, id);
        let desired = Record::new().with("uuid", PROVIDER).with("alt_id", "renamed");
        assert!(identity.check_unchanged(&desired).is_ok());

        let other = Record::new().with("uuid", GROUP);
        assert!(identity.check_unchanged(&other).is_err());
    }

    #[test]
    fn test_check_unchanged_script_group_reference() {
        let record = Record::new()
            .with("provider_id", PROVIDER)
            .with("script_group_id", "tools")
            .with("alt_id", "summarize");
        let identity = Identity::from_record(EntityKind::Script, &record).unwrap();
        assert!(identity.check_unchanged(&record).is_ok());
        let moved = record.clone().with("script_group_id", "other");
        assert!(identity.check_unchanged(&moved).is_err());
    }

    #[test]
    fn test_display() {
        let identity = Identity::by_id(EntityKind::Provider, provider_uuid());
        assert_eq!(identity.to_string(), format!("provider profile {PROVIDER}"));
    }
}
