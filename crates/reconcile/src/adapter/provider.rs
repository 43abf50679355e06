use super::{EntityAdapter, Issued, Target, flag, required_text, text};
use crate::error::{Error, Result};
use crate::identity::{Address, EntityKind, Identity};
use remote::{
    Backend, CancelToken, CreateProviderInput, Credentials, ProviderProfile, UpdateProviderInput,
};
use rules::Record;
use uuid::Uuid;

/// Account/provider profile, addressed by UUID only.
pub struct ProviderAdapter<'a> {
    backend: &'a dyn Backend,
    target: Target,
}

impl<'a> ProviderAdapter<'a> {
    pub fn new(backend: &'a dyn Backend, identity: Identity) -> Self {
        Self {
            backend,
            target: Target::new(identity),
        }
    }
}

fn to_record(profile: ProviderProfile) -> Record {
    let id = profile.uuid.to_string();
    Record::new()
        .with("id", id.clone())
        .with("uuid", id)
        .with("alt_id", profile.alt_id)
        .with("name", profile.name)
        .with("description", profile.description)
        .with("logo_url", profile.logo_url)
        .with("banner_url", profile.banner_url)
        .with("url", profile.url)
        .with("color", profile.color)
        .with("public", profile.public)
        .with("account_service", profile.account_service)
}

fn create_input(input: &Record) -> Result<CreateProviderInput> {
    Ok(CreateProviderInput {
        alt_id: text(input, "alt_id"),
        name: required_text(input, "name")?,
        description: required_text(input, "description")?,
        logo_url: text(input, "logo_url"),
        banner_url: text(input, "banner_url"),
        url: text(input, "url"),
        color: text(input, "color"),
        public: flag(input, "public").unwrap_or(true),
        account_service: flag(input, "account_service").unwrap_or(true),
    })
}

fn update_input(patch: &Record) -> UpdateProviderInput {
    UpdateProviderInput {
        alt_id: text(patch, "alt_id"),
        name: text(patch, "name"),
        description: text(patch, "description"),
        logo_url: text(patch, "logo_url"),
        banner_url: text(patch, "banner_url"),
        url: text(patch, "url"),
        color: text(patch, "color"),
        public: flag(patch, "public"),
        account_service: flag(patch, "account_service"),
    }
}

impl EntityAdapter for ProviderAdapter<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Provider
    }

    fn identity(&self) -> &Identity {
        &self.target.identity
    }

    fn resolve(&self, _cancel: &CancelToken) -> Result<Uuid> {
        // Without a uuid there is nothing to look up by.
        self.target.resolve(|identity| match identity.address()? {
            Address::Id(id) => Ok(id),
            Address::Group { .. } | Address::Script { .. } => Err(Error::identity(
                EntityKind::Provider,
                "a provider profile can only be addressed by uuid",
            )),
        })
    }

    fn create(&self, input: &Record, cancel: &CancelToken) -> Result<Issued> {
        self.target.ensure_unbound()?;
        let input = create_input(input)?;
        log::debug!("Creating provider profile {:?}", input.name);
        let issued = self.backend.create_provider(&input, cancel)?;
        let _ = self.target.resolved.set(issued.uuid);
        Ok(Issued {
            external_id: issued.uuid,
            credentials: Some(issued.credentials),
        })
    }

    fn read(&self, cancel: &CancelToken) -> Result<Record> {
        let id = self.resolve(cancel)?;
        log::debug!("Reading provider profile {id}");
        Ok(to_record(self.backend.read_provider(id, cancel)?))
    }

    fn update(&self, patch: &Record, cancel: &CancelToken) -> Result<Uuid> {
        let id = self.resolve(cancel)?;
        log::debug!("Updating provider profile {id}");
        Ok(self.backend.update_provider(id, &update_input(patch), cancel)?)
    }

    fn set_visibility(&self, public: bool, cancel: &CancelToken) -> Result<()> {
        let id = self.resolve(cancel)?;
        log::debug!("Setting provider profile {id} public={public}");
        Ok(self.backend.set_provider_public(id, public, cancel)?)
    }

    fn rotate_credentials(&self, cancel: &CancelToken) -> Result<Credentials> {
        let id = self.resolve(cancel)?;
        log::debug!("Resetting keys of provider profile {id}");
        Ok(self.backend.reset_provider_keys(id, cancel)?)
    }
}
