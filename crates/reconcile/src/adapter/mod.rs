//! Per-kind adapters over the remote entity API.
//!
//! An adapter addresses one remote entity through its [`Identity`] and
//! translates between field records and the typed remote inputs. It holds no
//! state besides the identity and the id it resolved to.

mod provider;
mod script;
mod script_group;

pub use provider::ProviderAdapter;
pub use script::ScriptAdapter;
pub use script_group::ScriptGroupAdapter;

use crate::error::{Error, Result};
use crate::identity::{EntityKind, Identity};
use remote::{Backend, CancelToken, Credentials};
use rules::Record;
use std::cell::OnceCell;
use uuid::Uuid;

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub external_id: Uuid,
    /// Credentials revealed at creation, for kinds that carry them.
    pub credentials: Option<Credentials>,
}

/// Create, read, update and visibility operations on one remote entity.
pub trait EntityAdapter {
    fn kind(&self) -> EntityKind;

    fn identity(&self) -> &Identity;

    /// Resolve the identity to the entity's UUID.
    ///
    /// The result is memoised for the lifetime of the adapter.
    fn resolve(&self, cancel: &CancelToken) -> Result<Uuid>;

    /// Create the entity. Only valid while no UUID is known.
    fn create(&self, input: &Record, cancel: &CancelToken) -> Result<Issued>;

    /// Fetch the remote field values.
    fn read(&self, cancel: &CancelToken) -> Result<Record>;

    /// Send a partial update. Fields absent from `patch` are left unchanged.
    ///
    /// Returns the id the server acted on.
    fn update(&self, patch: &Record, cancel: &CancelToken) -> Result<Uuid>;

    /// Flip only the public flag.
    fn set_visibility(&self, public: bool, cancel: &CancelToken) -> Result<()>;

    /// Invalidate the current credentials and issue new ones.
    fn rotate_credentials(&self, _cancel: &CancelToken) -> Result<Credentials> {
        Err(Error::identity(
            self.kind(),
            "only provider profiles carry credentials",
        ))
    }
}

/// Build the adapter for the identity's kind.
pub fn adapter_for<'a>(
    backend: &'a dyn Backend,
    identity: Identity,
) -> Box<dyn EntityAdapter + 'a> {
    match identity.kind {
        EntityKind::Provider => Box::new(ProviderAdapter::new(backend, identity)),
        EntityKind::ScriptGroup => Box::new(ScriptGroupAdapter::new(backend, identity)),
        EntityKind::Script => Box::new(ScriptAdapter::new(backend, identity)),
    }
}

/// Fail unless the server acted on the entity that was addressed.
pub(crate) fn check_acted_on(kind: EntityKind, expected: Uuid, actual: Uuid) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::IdMismatch {
            kind,
            expected,
            actual,
        })
    }
}

/// Identity plus its memoised resolution, shared by every adapter.
#[derive(Debug)]
struct Target {
    identity: Identity,
    resolved: OnceCell<Uuid>,
}

impl Target {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            resolved: OnceCell::new(),
        }
    }

    /// Return the memoised id, or run `lookup` once to find it.
    fn resolve(&self, lookup: impl FnOnce(&Identity) -> Result<Uuid>) -> Result<Uuid> {
        if let Some(id) = self.resolved.get() {
            return Ok(*id);
        }
        let id = match self.identity.external_id {
            Some(id) => id,
            None => lookup(&self.identity)?,
        };
        log::debug!("Resolved {} to {id}", self.identity);
        let _ = self.resolved.set(id);
        Ok(id)
    }

    /// Fail when the entity already has a UUID.
    fn ensure_unbound(&self) -> Result<()> {
        match self.identity.external_id {
            Some(id) => Err(Error::identity(
                self.identity.kind,
                format!("already bound to {id}; cannot create it again"),
            )),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Record conversion helpers
// ============================================================================

fn text(record: &Record, field: &str) -> Option<String> {
    record.str(field).map(ToString::to_string)
}

fn required_text(record: &Record, field: &str) -> Result<String> {
    text(record, field).ok_or_else(|| Error::invalid(field, format!("{field} is required")))
}

fn flag(record: &Record, field: &str) -> Option<bool> {
    record.bool(field)
}

fn required_flag(record: &Record, field: &str) -> Result<bool> {
    flag(record, field).ok_or_else(|| Error::invalid(field, format!("{field} is required")))
}

fn count(record: &Record, field: &str) -> Result<Option<u32>> {
    record
        .int(field)
        .map(|n| {
            u32::try_from(n).map_err(|_| {
                Error::invalid(field, format!("{n} does not fit in an unsigned 32-bit integer"))
            })
        })
        .transpose()
}

fn required_count(record: &Record, field: &str) -> Result<u32> {
    count(record, field)?.ok_or_else(|| Error::invalid(field, format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::MockBackend;

    #[test]
    fn test_count_conversion() {
        let record = Record::new()
            .with("ok", 100_i64)
            .with("negative", -1_i64)
            .with("huge", 4_294_967_296_i64);
        assert_eq!(count(&record, "ok").unwrap(), Some(100));
        assert_eq!(count(&record, "missing").unwrap(), None);
        assert!(count(&record, "negative").is_err());
        assert!(count(&record, "huge").is_err());
        assert!(required_count(&record, "missing").is_err());
    }

    #[test]
    fn test_required_text() {
        let record = Record::new().with("name", "Acme").with("empty", "");
        assert_eq!(required_text(&record, "name").unwrap(), "Acme");
        assert!(matches!(
            required_text(&record, "empty"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_target_resolves_once() {
        let target = Target::new(Identity::new(EntityKind::ScriptGroup));
        let id = Uuid::new_v4();
        assert_eq!(target.resolve(|_| Ok(id)).unwrap(), id);
        assert_eq!(
            target
                .resolve(|_| Err(Error::identity(EntityKind::ScriptGroup, "called twice")))
                .unwrap(),
            id
        );
    }

    #[test]
    fn test_target_prefers_known_id() {
        let id = Uuid::new_v4();
        let target = Target::new(Identity::by_id(EntityKind::Script, id));
        let resolved = target
            .resolve(|_| Err(Error::identity(EntityKind::Script, "lookup not expected")))
            .unwrap();
        assert_eq!(resolved, id);
        assert!(target.ensure_unbound().is_err());
    }

    #[test]
    fn test_adapter_for_kind() {
        let mock = MockBackend::new();
        for kind in EntityKind::ALL {
            let adapter = adapter_for(&mock, Identity::new(kind));
            assert_eq!(adapter.kind(), kind);
        }
    }

    #[test]
    fn test_rotation_only_for_providers() {
        let mock = MockBackend::new();
        let adapter = adapter_for(&mock, Identity::by_id(EntityKind::Script, Uuid::new_v4()));
        let err = adapter.rotate_credentials(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
        assert!(mock.calls().is_empty());
    }
}
