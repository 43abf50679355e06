use super::{
    EntityAdapter, Issued, Target, check_acted_on, count, flag, required_count, required_flag,
    required_text, text,
};
use crate::error::{Error, Result};
use crate::identity::{Address, EntityKind, Identity};
use remote::{
    Backend, CancelToken, CreateScriptInput, Recurrence, ScriptProfile, UpdateScriptInput,
};
use rules::Record;
use uuid::Uuid;

/// Script, addressed by UUID or by alt id within its group.
pub struct ScriptAdapter<'a> {
    backend: &'a dyn Backend,
    target: Target,
}

impl<'a> ScriptAdapter<'a> {
    pub fn new(backend: &'a dyn Backend, identity: Identity) -> Self {
        Self {
            backend,
            target: Target::new(identity),
        }
    }

    fn to_record(&self, profile: ScriptProfile) -> Record {
        let identity = &self.target.identity;
        let id = profile.uuid.to_string();
        // Report the group the way the caller referenced it.
        let group = identity
            .parent_alt_id
            .clone()
            .unwrap_or_else(|| profile.script_group_id.to_string());
        Record::new()
            .with("id", id.clone())
            .with("uuid", id)
            .with("provider_id", identity.owner_id.map(|p| p.to_string()))
            .with("script_group_id", group)
            .with("alt_id", profile.alt_id)
            .with("name", profile.name)
            .with("description", profile.description)
            .with("recurrence", profile.recurrence.as_str())
            .with("price_in_cents", profile.price_in_cents)
            .with("sla_sec", profile.sla_sec)
            .with("token_lifetime_sec", profile.token_lifetime_sec)
            .with("public", profile.public)
    }
}

fn create_input(input: &Record) -> Result<CreateScriptInput> {
    let recurrence = required_text(input, "recurrence")?
        .parse::<Recurrence>()
        .map_err(|e| Error::invalid("recurrence", e))?;
    Ok(CreateScriptInput {
        name: required_text(input, "name")?,
        description: required_text(input, "description")?,
        recurrence,
        price_in_cents: required_count(input, "price_in_cents")?,
        sla_sec: required_count(input, "sla_sec")?,
        token_lifetime_sec: required_count(input, "token_lifetime_sec")?,
        public: required_flag(input, "public")?,
    })
}

fn update_input(patch: &Record) -> Result<UpdateScriptInput> {
    Ok(UpdateScriptInput {
        name: text(patch, "name"),
        description: text(patch, "description"),
        price_in_cents: count(patch, "price_in_cents")?,
        sla_sec: count(patch, "sla_sec")?,
        token_lifetime_sec: count(patch, "token_lifetime_sec")?,
        public: flag(patch, "public"),
    })
}

impl EntityAdapter for ScriptAdapter<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Script
    }

    fn identity(&self) -> &Identity {
        &self.target.identity
    }

    fn resolve(&self, cancel: &CancelToken) -> Result<Uuid> {
        self.target.resolve(|identity| match identity.address()? {
            Address::Id(id) => Ok(id),
            Address::Script { group, alt_id } => {
                log::debug!("Resolving script {alt_id} in group {group}");
                Ok(self.backend.resolve_script(&group, &alt_id, cancel)?)
            }
            Address::Group { .. } => Err(Error::identity(
                EntityKind::Script,
                "expected a script group and alt id",
            )),
        })
    }

    fn create(&self, input: &Record, cancel: &CancelToken) -> Result<Issued> {
        self.target.ensure_unbound()?;
        let Address::Script { group, alt_id } = self.target.identity.parent_address()? else {
            return Err(Error::identity(
                EntityKind::Script,
                "expected a script group and alt id",
            ));
        };
        let input = create_input(input)?;
        log::debug!("Creating script {alt_id} in group {group}");
        let id = self.backend.create_script(&group, &alt_id, &input, cancel)?;
        let _ = self.target.resolved.set(id);
        Ok(Issued {
            external_id: id,
            credentials: None,
        })
    }

    fn read(&self, cancel: &CancelToken) -> Result<Record> {
        let id = self.resolve(cancel)?;
        log::debug!("Reading script {id}");
        let profile = self.backend.read_script(id, cancel)?;
        Ok(self.to_record(profile))
    }

    fn update(&self, patch: &Record, cancel: &CancelToken) -> Result<Uuid> {
        let input = update_input(patch)?;
        let id = self.resolve(cancel)?;
        log::debug!("Updating script {id}");
        Ok(self.backend.update_script(id, &input, cancel)?)
    }

    fn set_visibility(&self, public: bool, cancel: &CancelToken) -> Result<()> {
        let id = self.resolve(cancel)?;
        log::debug!("Setting script {id} public={public}");
        let input = UpdateScriptInput {
            public: Some(public),
            ..Default::default()
        };
        let acted = self.backend.update_script(id, &input, cancel)?;
        check_acted_on(EntityKind::Script, id, acted)
    }
}
