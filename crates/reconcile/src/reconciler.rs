//! The reconciliation state machine.
//!
//! Each operation reconciles exactly one entity and either fully succeeds,
//! producing a [`CanonicalState`], or fails without one. Validation and
//! identity checks always run before the first remote call. Nothing is
//! retried.

use crate::adapter::{EntityAdapter, adapter_for, check_acted_on};
use crate::error::{Error, Result};
use crate::identity::{EntityKind, Identity};
use crate::plan::{Transition, decide};
use crate::schema::Mode;
use crate::state::CanonicalState;
use remote::{CancelToken, Client, Credentials};
use rules::Record;
use uuid::Uuid;

/// Result of [`Reconciler::apply`].
#[derive(Debug, Clone)]
pub struct Outcome {
    pub transition: Transition,
    pub state: CanonicalState,
}

/// Drives create, read, update and soft delete against the remote API.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    client: &'a Client,
}

/// Stored fields for a freshly bound entity: the desired values plus its ids.
fn bound_fields(desired: &Record, id: Uuid) -> Record {
    let mut fields: Record = desired
        .iter()
        .filter(|(_, v)| !v.is_null() && !v.is_unknown())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    fields.set("id", id.to_string());
    fields.set("uuid", id.to_string());
    fields
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn adapter(&self, identity: Identity) -> Box<dyn EntityAdapter + 'a> {
        adapter_for(self.client.backend(), identity)
    }

    /// Create a new entity, or adopt an existing one when `desired` names a uuid.
    ///
    /// Defaults are applied before validation.
    pub fn create(
        &self,
        kind: EntityKind,
        desired: &Record,
        cancel: &CancelToken,
    ) -> Result<CanonicalState> {
        let schema = kind.schema();
        let desired = schema.with_defaults(desired);
        schema.validate(&desired, Mode::Create)?;
        let identity = Identity::from_record(kind, &desired)?;

        if let Some(id) = identity.external_id {
            return self.adopt(identity, id, &desired, cancel);
        }

        log::debug!("Creating {identity}");
        let adapter = self.adapter(identity.clone());
        let issued = adapter.create(&desired, cancel)?;
        log::info!("Created {kind} {}", issued.external_id);

        Ok(CanonicalState::new(
            identity,
            issued.external_id,
            bound_fields(&desired, issued.external_id),
            issued.credentials,
        ))
    }

    /// Push every desired field onto an existing entity, then rotate its
    /// credentials once since the current ones cannot be known.
    fn adopt(
        &self,
        identity: Identity,
        id: Uuid,
        desired: &Record,
        cancel: &CancelToken,
    ) -> Result<CanonicalState> {
        log::debug!("Adopting {identity}");
        let kind = identity.kind;
        let adapter = self.adapter(identity.clone());

        let patch = kind.schema().patch(desired);
        let acted = adapter.update(&patch, cancel)?;
        check_acted_on(kind, id, acted)?;

        let credentials = adapter.rotate_credentials(cancel)?;
        log::info!("Adopted {kind} {id} and issued new credentials");

        Ok(CanonicalState::new(
            identity,
            id,
            bound_fields(desired, id),
            Some(credentials),
        ))
    }

    /// Fetch the remote fields, keeping the credentials already held.
    pub fn read(
        &self,
        identity: &Identity,
        prior_credentials: Option<Credentials>,
        cancel: &CancelToken,
    ) -> Result<CanonicalState> {
        let adapter = self.adapter(identity.clone());
        let id = adapter.resolve(cancel)?;
        let fields = adapter.read(cancel)?;
        log::debug!("Read {} {id}", identity.kind);
        Ok(CanonicalState::new(
            identity.clone(),
            id,
            fields,
            prior_credentials,
        ))
    }

    /// Fetch an existing entity by its key, without any prior state.
    ///
    /// The key is a `uuid`, or the parent fields plus `alt_id` for nested
    /// kinds. Credentials are never part of the result.
    pub fn lookup(&self, kind: EntityKind, key: &Record, cancel: &CancelToken) -> Result<Record> {
        let identity = Identity::from_record(kind, key)?;
        identity.address()?;

        let adapter = self.adapter(identity);
        let id = adapter.resolve(cancel)?;
        let fields = adapter.read(cancel)?;
        log::debug!("Looked up {kind} {id}");
        Ok(fields)
    }

    /// Send the present fields of `desired` as a partial update, then read back.
    ///
    /// Only the supplied fields are validated. Addressing fields must match
    /// the identity.
    pub fn update(
        &self,
        identity: &Identity,
        prior_credentials: Option<Credentials>,
        desired: &Record,
        cancel: &CancelToken,
    ) -> Result<CanonicalState> {
        let kind = identity.kind;
        let schema = kind.schema();
        schema.validate(desired, Mode::Update)?;
        identity.check_unchanged(desired)?;
        let patch = schema.patch(desired);

        let adapter = self.adapter(identity.clone());
        let expected = adapter.resolve(cancel)?;
        log::debug!(
            "Updating {kind} {expected}: {}",
            patch.keys().collect::<Vec<_>>().join(", ")
        );
        let acted = adapter.update(&patch, cancel)?;
        check_acted_on(kind, expected, acted)?;

        let fields = adapter.read(cancel)?;
        log::info!("Updated {kind} {expected}");
        Ok(CanonicalState::new(
            identity.clone(),
            expected,
            fields,
            prior_credentials,
        ))
    }

    /// Hide the entity. Hiding an already hidden entity succeeds.
    pub fn delete(&self, identity: &Identity, cancel: &CancelToken) -> Result<()> {
        let adapter = self.adapter(identity.clone());
        adapter.set_visibility(false, cancel)?;
        log::info!("Soft-deleted {identity}");
        Ok(())
    }

    /// Decide the transition for `prior` and `desired` and run it.
    ///
    /// A soft delete yields the prior state marked as hidden. Returns `None`
    /// when there is neither a prior state nor a desired record.
    pub fn apply(
        &self,
        kind: EntityKind,
        prior: Option<&CanonicalState>,
        desired: Option<&Record>,
        cancel: &CancelToken,
    ) -> Result<Option<Outcome>> {
        if let Some(prior) = prior
            && prior.kind() != kind
        {
            return Err(Error::identity(
                kind,
                format!("state belongs to a {}", prior.kind()),
            ));
        }

        let Some(transition) = decide(prior, desired) else {
            return Ok(None);
        };
        log::debug!("Decided {transition} for {kind}");

        let state = match (transition, prior, desired) {
            (Transition::Create | Transition::Adopt, _, Some(desired)) => {
                self.create(kind, desired, cancel)?
            }
            (Transition::Update, Some(prior), Some(desired)) => {
                let immutable = kind.schema().immutable_changes(&prior.fields, desired);
                if !immutable.is_empty() {
                    return Err(Error::Validation(immutable));
                }
                self.update(&prior.identity, prior.credentials.clone(), desired, cancel)?
            }
            (Transition::SoftDelete, Some(prior), _) => {
                self.delete(&prior.identity, cancel)?;
                let mut state = prior.clone();
                state.fields.set("public", false);
                state.updated_at = chrono::Utc::now();
                state
            }
            _ => return Ok(None),
        };

        Ok(Some(Outcome { transition, state }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Binding;
    use remote::{Call, MockBackend, ProviderProfile, UpdateProviderInput};
    use rules::Value;
    use std::sync::Arc;

    fn setup() -> (MockBackend, Client) {
        let mock = MockBackend::new();
        let client = Client::with_backend(Arc::new(mock.clone()));
        (mock, client)
    }

    fn provider() -> Record {
        Record::new()
            .with("name", "Acme")
            .with("description", "Acme scripts")
    }

    fn existing(mock: &MockBackend) -> Uuid {
        let uuid = Uuid::new_v4();
        mock.insert_provider(ProviderProfile {
            uuid,
            alt_id: None,
            name: "Old name".to_string(),
            description: "Old description".to_string(),
            logo_url: None,
            banner_url: None,
            url: None,
            color: None,
            public: false,
            account_service: false,
        });
        uuid
    }

    fn group(provider: Uuid) -> Record {
        Record::new()
            .with("provider_id", provider.to_string())
            .with("alt_id", "tools")
            .with("name", "Tools")
            .with("description", "Useful tools")
            .with("public", true)
    }

    fn script(provider: Uuid) -> Record {
        Record::new()
            .with("provider_id", provider.to_string())
            .with("script_group_id", "tools")
            .with("alt_id", "summarize")
            .with("name", "Summarize")
            .with("description", "Summarizes text")
            .with("recurrence", "monthly")
            .with("price_in_cents", 100_i64)
            .with("sla_sec", 2400_i64)
            .with("token_lifetime_sec", 600_i64)
            .with("public", true)
    }

    #[test]
    fn test_create_assigns_id_and_credentials() {
        let (mock, client) = setup();
        let state = Reconciler::new(&client)
            .create(EntityKind::Provider, &provider(), &CancelToken::new())
            .unwrap();

        let id = state.external_id().unwrap();
        assert!(mock.provider(id).is_some());
        assert!(state.credentials.as_ref().unwrap().is_complete());
        assert_eq!(state.fields.str("color"), Some("#a0a0a0"));
        assert_eq!(state.fields.str("id"), Some(id.to_string().as_str()));
        assert_eq!(mock.call_count("create_provider"), 1);
        assert_eq!(mock.call_count("reset_provider_keys"), 0);
    }

    #[test]
    fn test_adopt_updates_then_rotates_once() {
        let (mock, client) = setup();
        let uuid = existing(&mock);
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();

        let desired = provider().with("uuid", uuid.to_string());
        let state = reconciler
            .create(EntityKind::Provider, &desired, &cancel)
            .unwrap();

        let names: Vec<_> = mock.calls().iter().map(Call::name).collect();
        assert_eq!(names, vec!["update_provider", "reset_provider_keys"]);
        assert_eq!(state.external_id(), Some(uuid));
        let adopted = state.credentials.clone().unwrap();
        assert!(adopted.is_complete());

        let profile = mock.provider(uuid).unwrap();
        assert_eq!(profile.name, "Acme");
        assert!(profile.public);
        assert_eq!(profile.color.as_deref(), Some("#a0a0a0"));

        let read = reconciler
            .read(&state.identity, state.credentials.clone(), &cancel)
            .unwrap();
        assert_eq!(read.credentials, Some(adopted));
        assert_eq!(mock.call_count("reset_provider_keys"), 1);
    }

    #[test]
    fn test_adopt_rejects_id_mismatch_without_rotation() {
        let (mock, client) = setup();
        let uuid = existing(&mock);
        mock.answer_updates_with(Uuid::new_v4());
        let desired = provider().with("uuid", uuid.to_string());
        let err = Reconciler::new(&client)
            .create(EntityKind::Provider, &desired, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::IdMismatch { .. }));
        assert_eq!(mock.call_count("reset_provider_keys"), 0);
    }

    #[test]
    fn test_delete_twice_succeeds() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let state = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap();
        let id = state.external_id().unwrap();

        reconciler.delete(&state.identity, &cancel).unwrap();
        assert!(!mock.provider(id).unwrap().public);
        reconciler.delete(&state.identity, &cancel).unwrap();
        assert!(!mock.provider(id).unwrap().public);
        assert_eq!(mock.call_count("set_provider_public"), 2);
    }

    #[test]
    fn test_lookup_group_by_provider_and_alt_id() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let provider = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap()
            .external_id()
            .unwrap();
        let created = reconciler
            .create(EntityKind::ScriptGroup, &group(provider), &cancel)
            .unwrap();
        mock.clear_calls();

        let key = Record::new()
            .with("provider_id", provider.to_string())
            .with("alt_id", "tools");
        let found = reconciler
            .lookup(EntityKind::ScriptGroup, &key, &cancel)
            .unwrap();
        let id = created.external_id().unwrap().to_string();
        assert_eq!(found.str("uuid"), Some(id.as_str()));
        assert_eq!(found.str("name"), Some("Tools"));
        let names: Vec<_> = mock.calls().iter().map(Call::name).collect();
        assert_eq!(names, vec!["resolve_script_group", "read_script_group"]);
    }

    #[test]
    fn test_lookup_provider_by_uuid_has_no_credentials() {
        let (mock, client) = setup();
        let uuid = existing(&mock);
        let key = Record::new().with("uuid", uuid.to_string());
        let found = Reconciler::new(&client)
            .lookup(EntityKind::Provider, &key, &CancelToken::new())
            .unwrap();
        assert_eq!(found.str("name"), Some("Old name"));
        assert!(!found.contains("api_key"));
        assert!(!found.contains("secret_key"));
    }

    #[test]
    fn test_lookup_with_incomplete_key_makes_no_calls() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();

        let key = Record::new().with("alt_id", "summarize");
        let err = reconciler.lookup(EntityKind::Script, &key, &cancel).unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));

        let key = Record::new().with("uuid", "not-a-uuid");
        let err = reconciler.lookup(EntityKind::Provider, &key, &cancel).unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_lookup_missing_script_is_not_found() {
        let (_, client) = setup();
        let key = Record::new()
            .with("provider_id", Uuid::new_v4().to_string())
            .with("script_group_id", Uuid::new_v4().to_string())
            .with("alt_id", "summarize");
        let err = Reconciler::new(&client)
            .lookup(EntityKind::Script, &key, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Adapter(remote::Error::NotFound { .. })));
    }

    #[test]
    fn test_update_sends_only_description() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let state = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap();
        let id = state.external_id().unwrap();
        mock.clear_calls();

        let desired = Record::new().with("description", "Better scripts");
        let updated = reconciler
            .update(&state.identity, state.credentials.clone(), &desired, &cancel)
            .unwrap();

        assert_eq!(
            mock.calls()[0],
            Call::UpdateProvider(
                id,
                UpdateProviderInput {
                    description: Some("Better scripts".to_string()),
                    ..Default::default()
                }
            )
        );
        assert_eq!(updated.fields.str("description"), Some("Better scripts"));
        assert_eq!(updated.fields.str("name"), Some("Acme"));
        assert_eq!(updated.credentials, state.credentials);
    }

    #[test]
    fn test_update_id_mismatch_is_fatal() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let state = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap();
        mock.answer_updates_with(Uuid::new_v4());

        let desired = Record::new().with("name", "Renamed");
        let err = reconciler
            .update(&state.identity, None, &desired, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::IdMismatch { .. }));
        assert_eq!(mock.call_count("read_provider"), 0);
    }

    #[test]
    fn test_apply_rejects_emptied_name_before_remote_calls() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let state = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap();
        mock.clear_calls();

        let desired = provider().with("name", "");
        let err = reconciler
            .apply(EntityKind::Provider, Some(&state), Some(&desired), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.violations()[0].field, "name");
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_validation_happens_before_remote_calls() {
        let (mock, client) = setup();
        let desired = provider().with("color", "#FFF");
        let err = Reconciler::new(&client)
            .create(EntityKind::Provider, &desired, &CancelToken::new())
            .unwrap_err();
        assert!(err.category().is_local());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_identity_error_before_remote_calls() {
        let (mock, client) = setup();
        let desired = script(Uuid::new_v4()).with("provider_id", Value::Unknown);
        let err = Reconciler::new(&client)
            .create(EntityKind::Script, &desired, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_cancelled_operation_makes_no_calls() {
        let (mock, client) = setup();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Reconciler::new(&client)
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Cancelled);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_remote_failure_produces_no_state() {
        let (mock, client) = setup();
        mock.fail_next("name already taken");
        let err = Reconciler::new(&client)
            .create(EntityKind::Provider, &provider(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "name already taken");
    }

    #[test]
    fn test_apply_full_lifecycle_for_script() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();

        let provider = reconciler
            .apply(EntityKind::Provider, None, Some(&provider()), &cancel)
            .unwrap()
            .unwrap()
            .state
            .external_id()
            .unwrap();
        reconciler
            .apply(EntityKind::ScriptGroup, None, Some(&group(provider)), &cancel)
            .unwrap()
            .unwrap();

        let created = reconciler
            .apply(EntityKind::Script, None, Some(&script(provider)), &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(created.transition, Transition::Create);
        assert!(created.state.credentials.is_none());

        let desired = script(provider).with("price_in_cents", 250_i64);
        let updated = reconciler
            .apply(EntityKind::Script, Some(&created.state), Some(&desired), &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(updated.transition, Transition::Update);
        assert_eq!(updated.state.fields.int("price_in_cents"), Some(250));
        assert_eq!(updated.state.fields.str("script_group_id"), Some("tools"));

        let deleted = reconciler
            .apply(EntityKind::Script, Some(&updated.state), None, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(deleted.transition, Transition::SoftDelete);
        assert_eq!(deleted.state.binding(), Binding::SoftDeleted);
        let id = deleted.state.external_id().unwrap();
        assert!(!mock.script(id).unwrap().public);
    }

    #[test]
    fn test_apply_rejects_recurrence_change() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let provider = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap()
            .external_id()
            .unwrap();
        reconciler
            .create(EntityKind::ScriptGroup, &group(provider), &cancel)
            .unwrap();
        let state = reconciler
            .create(EntityKind::Script, &script(provider), &cancel)
            .unwrap();
        mock.clear_calls();

        let desired = script(provider).with("recurrence", "yearly");
        let err = reconciler
            .apply(EntityKind::Script, Some(&state), Some(&desired), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_update_cannot_move_group() {
        let (mock, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let provider = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap()
            .external_id()
            .unwrap();
        let state = reconciler
            .create(EntityKind::ScriptGroup, &group(provider), &cancel)
            .unwrap();
        mock.clear_calls();

        let desired = group(provider).with("alt_id", "gadgets");
        let err = reconciler
            .update(&state.identity, None, &desired, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_apply_nothing_to_do() {
        let (_, client) = setup();
        let outcome = Reconciler::new(&client)
            .apply(EntityKind::Script, None, None, &CancelToken::new())
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_apply_rejects_state_of_other_kind() {
        let (_, client) = setup();
        let reconciler = Reconciler::new(&client);
        let cancel = CancelToken::new();
        let state = reconciler
            .create(EntityKind::Provider, &provider(), &cancel)
            .unwrap();
        let err = reconciler
            .apply(EntityKind::Script, Some(&state), None, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
    }
}
