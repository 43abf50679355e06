use super::{
    EntityAdapter, Issued, Target, check_acted_on, flag, required_flag, required_text, text,
};
use crate::error::{Error, Result};
use crate::identity::{Address, EntityKind, Identity};
use remote::{
    Backend, CancelToken, CreateScriptGroupInput, ScriptGroupProfile, UpdateScriptGroupInput,
};
use rules::Record;
use uuid::Uuid;

/// Script group, addressed by UUID or by alt id within its provider.
pub struct ScriptGroupAdapter<'a> {
    backend: &'a dyn Backend,
    target: Target,
}

impl<'a> ScriptGroupAdapter<'a> {
    pub fn new(backend: &'a dyn Backend, identity: Identity) -> Self {
        Self {
            backend,
            target: Target::new(identity),
        }
    }
}

fn to_record(profile: ScriptGroupProfile) -> Record {
    let id = profile.uuid.to_string();
    Record::new()
        .with("id", id.clone())
        .with("uuid", id)
        .with("provider_id", profile.provider_id.to_string())
        .with("alt_id", profile.alt_id)
        .with("name", profile.name)
        .with("description", profile.description)
        .with("public", profile.public)
}

fn update_input(patch: &Record) -> UpdateScriptGroupInput {
    UpdateScriptGroupInput {
        name: text(patch, "name"),
        description: text(patch, "description"),
        public: flag(patch, "public"),
    }
}

impl EntityAdapter for ScriptGroupAdapter<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::ScriptGroup
    }

    fn identity(&self) -> &Identity {
        &self.target.identity
    }

    fn resolve(&self, cancel: &CancelToken) -> Result<Uuid> {
        self.target.resolve(|identity| match identity.address()? {
            Address::Id(id) => Ok(id),
            Address::Group { provider, alt_id } => {
                log::debug!("Resolving script group {alt_id} of provider {provider}");
                Ok(self.backend.resolve_script_group(provider, &alt_id, cancel)?)
            }
            Address::Script { .. } => Err(Error::identity(
                EntityKind::ScriptGroup,
                "expected a provider and alt id",
            )),
        })
    }

    fn create(&self, input: &Record, cancel: &CancelToken) -> Result<Issued> {
        self.target.ensure_unbound()?;
        let Address::Group { provider, alt_id } = self.target.identity.parent_address()? else {
            return Err(Error::identity(
                EntityKind::ScriptGroup,
                "expected a provider and alt id",
            ));
        };
        let input = CreateScriptGroupInput {
            name: required_text(input, "name")?,
            description: required_text(input, "description")?,
            public: required_flag(input, "public")?,
        };
        log::debug!("Creating script group {alt_id} in provider {provider}");
        let id = self
            .backend
            .create_script_group(provider, &alt_id, &input, cancel)?;
        let _ = self.target.resolved.set(id);
        Ok(Issued {
            external_id: id,
            credentials: None,
        })
    }

    fn read(&self, cancel: &CancelToken) -> Result<Record> {
        let id = self.resolve(cancel)?;
        log::debug!("Reading script group {id}");
        Ok(to_record(self.backend.read_script_group(id, cancel)?))
    }

    fn update(&self, patch: &Record, cancel: &CancelToken) -> Result<Uuid> {
        let id = self.resolve(cancel)?;
        log::debug!("Updating script group {id}");
        Ok(self
            .backend
            .update_script_group(id, &update_input(patch), cancel)?)
    }

    fn set_visibility(&self, public: bool, cancel: &CancelToken) -> Result<()> {
        let id = self.resolve(cancel)?;
        log::debug!("Setting script group {id} public={public}");
        let input = UpdateScriptGroupInput {
            public: Some(public),
            ..Default::default()
        };
        let acted = self.backend.update_script_group(id, &input, cancel)?;
        check_acted_on(EntityKind::ScriptGroup, id, acted)
    }
}
