//! Backend trait and implementations for the remote entity API.
//!
//! The primary implementation is [`graphql::GraphqlBackend`], which talks to
//! the hosted API. [`MockBackend`] keeps entities in memory and records every
//! call, for tests.
//!
//! # Testing
//!
//! ```
//! use remote::backend::{Backend, MockBackend};
//! use remote::{CancelToken, CreateProviderInput};
//!
//! let mock = MockBackend::new();
//! let cancel = CancelToken::new();
//! let issued = mock
//!     .create_provider(
//!         &CreateProviderInput {
//!             name: "Acme".into(),
//!             description: "Acme scripts".into(),
//!             ..Default::default()
//!         },
//!         &cancel,
//!     )
//!     .unwrap();
//!
//! assert!(issued.credentials.is_complete());
//! assert_eq!(mock.call_count("create_provider"), 1);
//! ```

pub mod graphql;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::types::{
    CreateProviderInput, CreateScriptGroupInput, CreateScriptInput, Credentials, GroupRef,
    IssuedProvider, ProviderProfile, ScriptGroupProfile, ScriptProfile, UpdateProviderInput,
    UpdateScriptGroupInput, UpdateScriptInput,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Synchronous access to the remote entity API.
///
/// Every call honours `cancel`: a fired token yields [`Error::Cancelled`].
/// Implementations never retry.
pub trait Backend: Send + Sync {
    // Provider profiles

    /// Create a provider profile. The issued credentials are never revealed again.
    fn create_provider(
        &self,
        input: &CreateProviderInput,
        cancel: &CancelToken,
    ) -> Result<IssuedProvider>;

    fn read_provider(&self, id: Uuid, cancel: &CancelToken) -> Result<ProviderProfile>;

    /// Partially update a provider profile, returning the id the server acted on.
    fn update_provider(
        &self,
        id: Uuid,
        input: &UpdateProviderInput,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    /// Flip only the public flag of a provider profile.
    fn set_provider_public(&self, id: Uuid, public: bool, cancel: &CancelToken) -> Result<()>;

    /// Invalidate the current keys and issue new ones.
    fn reset_provider_keys(&self, id: Uuid, cancel: &CancelToken) -> Result<Credentials>;

    // Script groups

    /// Resolve a group alt id within a provider to the group's UUID.
    fn resolve_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    fn create_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        input: &CreateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    fn read_script_group(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptGroupProfile>;

    fn update_script_group(
        &self,
        id: Uuid,
        input: &UpdateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    // Scripts

    /// Resolve a script alt id within a group to the script's UUID.
    fn resolve_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    fn create_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        input: &CreateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid>;

    fn read_script(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptProfile>;

    fn update_script(
        &self,
        id: Uuid,
        input: &UpdateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid>;
}

// ============================================================================
// Mock backend
// ============================================================================

/// A call received by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateProvider(CreateProviderInput),
    ReadProvider(Uuid),
    UpdateProvider(Uuid, UpdateProviderInput),
    SetProviderPublic(Uuid, bool),
    ResetProviderKeys(Uuid),
    ResolveScriptGroup(Uuid, String),
    CreateScriptGroup(Uuid, String, CreateScriptGroupInput),
    ReadScriptGroup(Uuid),
    UpdateScriptGroup(Uuid, UpdateScriptGroupInput),
    ResolveScript(GroupRef, String),
    CreateScript(GroupRef, String, CreateScriptInput),
    ReadScript(Uuid),
    UpdateScript(Uuid, UpdateScriptInput),
}

impl Call {
    /// Operation name, matching the [`Backend`] method.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateProvider(..) => "create_provider",
            Self::ReadProvider(..) => "read_provider",
            Self::UpdateProvider(..) => "update_provider",
            Self::SetProviderPublic(..) => "set_provider_public",
            Self::ResetProviderKeys(..) => "reset_provider_keys",
            Self::ResolveScriptGroup(..) => "resolve_script_group",
            Self::CreateScriptGroup(..) => "create_script_group",
            Self::ReadScriptGroup(..) => "read_script_group",
            Self::UpdateScriptGroup(..) => "update_script_group",
            Self::ResolveScript(..) => "resolve_script",
            Self::CreateScript(..) => "create_script",
            Self::ReadScript(..) => "read_script",
            Self::UpdateScript(..) => "update_script",
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    providers: HashMap<Uuid, ProviderProfile>,
    groups: HashMap<Uuid, ScriptGroupProfile>,
    scripts: HashMap<Uuid, ScriptProfile>,
    calls: Vec<Call>,
    fail_next: Option<String>,
    update_id: Option<Uuid>,
}

impl MockState {
    fn group_id(&self, group: &GroupRef) -> Result<Uuid> {
        match group {
            GroupRef::Id(id) if self.groups.contains_key(id) => Ok(*id),
            GroupRef::Id(id) => Err(Error::not_found("script group", id)),
            GroupRef::AltId { provider, alt_id } => self
                .groups
                .values()
                .find(|g| g.provider_id == *provider && g.alt_id == *alt_id)
                .map(|g| g.uuid)
                .ok_or_else(|| Error::not_found("script group", group)),
        }
    }

    fn updated(&self, id: Uuid) -> Uuid {
        self.update_id.unwrap_or(id)
    }
}

fn issue_credentials() -> Credentials {
    Credentials::new(
        format!("ak_{}", Uuid::new_v4().simple()),
        format!("sk_{}", Uuid::new_v4().simple()),
    )
}

/// In-memory backend for testing without network access.
///
/// Clones share the same entities and call journal.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check cancellation, record the call and apply any injected failure.
    fn begin(&self, call: Call, cancel: &CancelToken) -> Result<MutexGuard<'_, MockState>> {
        cancel.check()?;
        let mut state = self.lock();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(message) => Err(Error::Remote(message)),
            None => Ok(state),
        }
    }

    /// Seed an existing provider profile.
    pub fn insert_provider(&self, profile: ProviderProfile) {
        self.lock().providers.insert(profile.uuid, profile);
    }

    /// Seed an existing script group.
    pub fn insert_script_group(&self, profile: ScriptGroupProfile) {
        self.lock().groups.insert(profile.uuid, profile);
    }

    /// Seed an existing script.
    pub fn insert_script(&self, profile: ScriptProfile) {
        self.lock().scripts.insert(profile.uuid, profile);
    }

    pub fn provider(&self, id: Uuid) -> Option<ProviderProfile> {
        self.lock().providers.get(&id).cloned()
    }

    pub fn script_group(&self, id: Uuid) -> Option<ScriptGroupProfile> {
        self.lock().groups.get(&id).cloned()
    }

    pub fn script(&self, id: Uuid) -> Option<ScriptProfile> {
        self.lock().scripts.get(&id).cloned()
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls received for the named operation.
    pub fn call_count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.name() == name).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next call fail with a remote error carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Make update calls report `id` instead of the id they were given.
    pub fn answer_updates_with(&self, id: Uuid) {
        self.lock().update_id = Some(id);
    }
}

impl Backend for MockBackend {
    fn create_provider(
        &self,
        input: &CreateProviderInput,
        cancel: &CancelToken,
    ) -> Result<IssuedProvider> {
        let mut state = self.begin(Call::CreateProvider(input.clone()), cancel)?;
        let uuid = Uuid::new_v4();
        state.providers.insert(
            uuid,
            ProviderProfile {
                uuid,
                alt_id: input.alt_id.clone(),
                name: input.name.clone(),
                description: input.description.clone(),
                logo_url: input.logo_url.clone(),
                banner_url: input.banner_url.clone(),
                url: input.url.clone(),
                color: input.color.clone(),
                public: input.public,
                account_service: input.account_service,
            },
        );
        Ok(IssuedProvider {
            uuid,
            credentials: issue_credentials(),
        })
    }

    fn read_provider(&self, id: Uuid, cancel: &CancelToken) -> Result<ProviderProfile> {
        let state = self.begin(Call::ReadProvider(id), cancel)?;
        state
            .providers
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("provider", id))
    }

    fn update_provider(
        &self,
        id: Uuid,
        input: &UpdateProviderInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let mut state = self.begin(Call::UpdateProvider(id, input.clone()), cancel)?;
        let profile = state
            .providers
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("provider", id))?;
        let input = input.clone();
        if input.alt_id.is_some() {
            profile.alt_id = input.alt_id;
        }
        if let Some(name) = input.name {
            profile.name = name;
        }
        if let Some(description) = input.description {
            profile.description = description;
        }
        if input.logo_url.is_some() {
            profile.logo_url = input.logo_url;
        }
        if input.banner_url.is_some() {
            profile.banner_url = input.banner_url;
        }
        if input.url.is_some() {
            profile.url = input.url;
        }
        if input.color.is_some() {
            profile.color = input.color;
        }
        if let Some(public) = input.public {
            profile.public = public;
        }
        if let Some(account_service) = input.account_service {
            profile.account_service = account_service;
        }
        Ok(state.updated(id))
    }

    fn set_provider_public(&self, id: Uuid, public: bool, cancel: &CancelToken) -> Result<()> {
        let mut state = self.begin(Call::SetProviderPublic(id, public), cancel)?;
        let profile = state
            .providers
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("provider", id))?;
        profile.public = public;
        Ok(())
    }

    fn reset_provider_keys(&self, id: Uuid, cancel: &CancelToken) -> Result<Credentials> {
        let state = self.begin(Call::ResetProviderKeys(id), cancel)?;
        if !state.providers.contains_key(&id) {
            return Err(Error::not_found("provider", id));
        }
        Ok(issue_credentials())
    }

    fn resolve_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let state = self.begin(Call::ResolveScriptGroup(provider, alt_id.to_string()), cancel)?;
        state.group_id(&GroupRef::AltId {
            provider,
            alt_id: alt_id.to_string(),
        })
    }

    fn create_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        input: &CreateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let mut state = self.begin(
            Call::CreateScriptGroup(provider, alt_id.to_string(), input.clone()),
            cancel,
        )?;
        if !state.providers.contains_key(&provider) {
            return Err(Error::not_found("provider", provider));
        }
        if state
            .groups
            .values()
            .any(|g| g.provider_id == provider && g.alt_id == alt_id)
        {
            return Err(Error::Remote(format!(
                "script group with alt_id {alt_id} already exists"
            )));
        }
        let uuid = Uuid::new_v4();
        state.groups.insert(
            uuid,
            ScriptGroupProfile {
                uuid,
                provider_id: provider,
                alt_id: alt_id.to_string(),
                name: input.name.clone(),
                description: input.description.clone(),
                public: input.public,
            },
        );
        Ok(uuid)
    }

    fn read_script_group(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptGroupProfile> {
        let state = self.begin(Call::ReadScriptGroup(id), cancel)?;
        state
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("script group", id))
    }

    fn update_script_group(
        &self,
        id: Uuid,
        input: &UpdateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let mut state = self.begin(Call::UpdateScriptGroup(id, input.clone()), cancel)?;
        let profile = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("script group", id))?;
        if let Some(name) = &input.name {
            profile.name.clone_from(name);
        }
        if let Some(description) = &input.description {
            profile.description.clone_from(description);
        }
        if let Some(public) = input.public {
            profile.public = public;
        }
        Ok(state.updated(id))
    }

    fn resolve_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let state = self.begin(Call::ResolveScript(group.clone(), alt_id.to_string()), cancel)?;
        let group_id = state.group_id(group)?;
        state
            .scripts
            .values()
            .find(|s| s.script_group_id == group_id && s.alt_id == alt_id)
            .map(|s| s.uuid)
            .ok_or_else(|| Error::not_found("script", format!("{group}/{alt_id}")))
    }

    fn create_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        input: &CreateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let mut state = self.begin(
            Call::CreateScript(group.clone(), alt_id.to_string(), input.clone()),
            cancel,
        )?;
        let group_id = state.group_id(group)?;
        if state
            .scripts
            .values()
            .any(|s| s.script_group_id == group_id && s.alt_id == alt_id)
        {
            return Err(Error::Remote(format!(
                "script with alt_id {alt_id} already exists"
            )));
        }
        let uuid = Uuid::new_v4();
        state.scripts.insert(
            uuid,
            ScriptProfile {
                uuid,
                script_group_id: group_id,
                alt_id: alt_id.to_string(),
                name: input.name.clone(),
                description: input.description.clone(),
                recurrence: input.recurrence,
                price_in_cents: input.price_in_cents,
                sla_sec: input.sla_sec,
                token_lifetime_sec: input.token_lifetime_sec,
                public: input.public,
            },
        );
        Ok(uuid)
    }

    fn read_script(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptProfile> {
        let state = self.begin(Call::ReadScript(id), cancel)?;
        state
            .scripts
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("script", id))
    }

    fn update_script(
        &self,
        id: Uuid,
        input: &UpdateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let mut state = self.begin(Call::UpdateScript(id, input.clone()), cancel)?;
        let profile = state
            .scripts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("script", id))?;
        if let Some(name) = &input.name {
            profile.name.clone_from(name);
        }
        if let Some(description) = &input.description {
            profile.description.clone_from(description);
        }
        if let Some(price) = input.price_in_cents {
            profile.price_in_cents = price;
        }
        if let Some(sla) = input.sla_sec {
            profile.sla_sec = sla;
        }
        if let Some(lifetime) = input.token_lifetime_sec {
            profile.token_lifetime_sec = lifetime;
        }
        if let Some(public) = input.public {
            profile.public = public;
        }
        Ok(state.updated(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recurrence;

    fn create_input() -> CreateProviderInput {
        CreateProviderInput {
            name: "Acme".to_string(),
            description: "Acme scripts".to_string(),
            public: true,
            account_service: true,
            ..Default::default()
        }
    }

    fn group_input() -> CreateScriptGroupInput {
        CreateScriptGroupInput {
            name: "Tools".to_string(),
            description: "Useful tools".to_string(),
            public: true,
        }
    }

    fn script_input() -> CreateScriptInput {
        CreateScriptInput {
            name: "Summarize".to_string(),
            description: "Summarizes text".to_string(),
            recurrence: Recurrence::Monthly,
            price_in_cents: 100,
            sla_sec: 2400,
            token_lifetime_sec: 600,
            public: true,
        }
    }

    #[test]
    fn test_mock_create_and_read_provider() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let issued = mock.create_provider(&create_input(), &cancel).unwrap();
        let profile = mock.read_provider(issued.uuid, &cancel).unwrap();
        assert_eq!(profile.name, "Acme");
        assert!(issued.credentials.is_complete());
    }

    #[test]
    fn test_mock_partial_update_leaves_other_fields() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let issued = mock.create_provider(&create_input(), &cancel).unwrap();
        let input = UpdateProviderInput {
            description: Some("Better scripts".to_string()),
            ..Default::default()
        };
        let id = mock.update_provider(issued.uuid, &input, &cancel).unwrap();
        assert_eq!(id, issued.uuid);
        let profile = mock.provider(issued.uuid).unwrap();
        assert_eq!(profile.name, "Acme");
        assert_eq!(profile.description, "Better scripts");
    }

    #[test]
    fn test_mock_reset_keys_issues_new_credentials() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let issued = mock.create_provider(&create_input(), &cancel).unwrap();
        let rotated = mock.reset_provider_keys(issued.uuid, &cancel).unwrap();
        assert_ne!(rotated, issued.credentials);
    }

    #[test]
    fn test_mock_read_missing_is_not_found() {
        let mock = MockBackend::new();
        let err = mock
            .read_provider(Uuid::new_v4(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_mock_group_resolution_by_alt_id() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let provider = mock.create_provider(&create_input(), &cancel).unwrap().uuid;
        let group = mock
            .create_script_group(provider, "tools", &group_input(), &cancel)
            .unwrap();
        assert_eq!(mock.resolve_script_group(provider, "tools", &cancel).unwrap(), group);
        assert!(mock.resolve_script_group(provider, "other", &cancel).is_err());
    }

    #[test]
    fn test_mock_duplicate_group_alt_id_rejected() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let provider = mock.create_provider(&create_input(), &cancel).unwrap().uuid;
        mock.create_script_group(provider, "tools", &group_input(), &cancel)
            .unwrap();
        let err = mock
            .create_script_group(provider, "tools", &group_input(), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[test]
    fn test_mock_script_in_group_by_alt_id() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        let provider = mock.create_provider(&create_input(), &cancel).unwrap().uuid;
        let group = mock
            .create_script_group(provider, "tools", &group_input(), &cancel)
            .unwrap();
        let group_ref = GroupRef::AltId {
            provider,
            alt_id: "tools".to_string(),
        };
        let script = mock
            .create_script(&group_ref, "summarize", &script_input(), &cancel)
            .unwrap();
        assert_eq!(mock.script(script).unwrap().script_group_id, group);
        assert_eq!(
            mock.resolve_script(&GroupRef::Id(group), "summarize", &cancel)
                .unwrap(),
            script
        );
    }

    #[test]
    fn test_mock_cancelled_call_is_not_recorded() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = mock.create_provider(&create_input(), &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_mock_fail_next_applies_once() {
        let mock = MockBackend::new();
        let cancel = CancelToken::new();
        mock.fail_next("service unavailable");
        let err = mock.create_provider(&create_input(), &cancel).unwrap_err();
        assert_eq!(err.to_string(), "service unavailable");
        assert!(mock.create_provider(&create_input(), &cancel).is_ok());
        assert_eq!(mock.call_count("create_provider"), 2);
    }
}
