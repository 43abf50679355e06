//! GraphQL-over-HTTP backend.
//!
//! Every operation is a single `POST` of `{query, variables}` to the API URL,
//! authenticated with a bearer token. GraphQL-level errors are surfaced with
//! the server's message unchanged.

use crate::backend::Backend;
use crate::cancel::{CancelToken, run_cancellable};
use crate::error::{Error, Result};
use crate::types::{
    CreateProviderInput, CreateScriptGroupInput, CreateScriptInput, Credentials, GroupRef,
    IssuedProvider, ProviderProfile, ScriptGroupProfile, ScriptProfile, Secret,
    UpdateProviderInput, UpdateScriptGroupInput, UpdateScriptInput,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

const USER_AGENT: &str = concat!("scribae/", env!("CARGO_PKG_VERSION"));

const PROVIDER_FIELDS: &str =
    "uuid altId name description logoUrl bannerUrl url color public accountService";
const SCRIPT_GROUP_FIELDS: &str = "uuid providerId altId name description public";
const SCRIPT_FIELDS: &str = "uuid scriptGroupId altId name description recurrence priceInCents \
                             slaSec tokenLifetimeSec public";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedKeys {
    uuid: Option<Uuid>,
    api_key: String,
    secret_key: String,
}

impl IssuedKeys {
    fn credentials(&self) -> Credentials {
        Credentials {
            api_key: Some(Secret::new(self.api_key.clone())),
            secret_key: Some(Secret::new(self.secret_key.clone())),
        }
    }
}

/// Backend for the hosted GraphQL API.
///
/// # Example
///
/// ```no_run
/// use remote::backend::graphql::GraphqlBackend;
/// use remote::backend::Backend;
/// use remote::CancelToken;
/// use std::time::Duration;
///
/// let backend = GraphqlBackend::new(
///     "https://api.myscribae.com",
///     "token",
///     Duration::from_secs(30),
/// );
/// let profile = backend
///     .read_provider(uuid::Uuid::nil(), &CancelToken::new())
///     .unwrap();
/// println!("{}", profile.name);
/// ```
pub struct GraphqlBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// GraphQL endpoint.
    api_url: String,
    token: Secret,
    /// Upper bound for one request.
    timeout: Duration,
}

impl GraphqlBackend {
    /// Create a backend for `api_url`, authenticating with `token`.
    #[must_use]
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            api_url: api_url.into(),
            token: Secret::new(token),
            timeout,
        }
    }

    /// Get the configured API URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Run one GraphQL document and return the value under `field` in `data`.
    fn execute(
        &self,
        query: String,
        field: &'static str,
        variables: Value,
        cancel: &CancelToken,
    ) -> Result<Value> {
        let agent = self.agent.clone();
        let url = self.api_url.clone();
        let auth = format!("Bearer {}", self.token.expose());
        let body = json!({ "query": query, "variables": variables });
        let timeout = request_timeout(self.timeout, cancel);

        log::debug!("POST {url} ({field}, timeout {timeout:?})");
        let response: GraphqlResponse = run_cancellable(cancel, field, move || {
            let response = agent
                .post(&url)
                .config()
                .timeout_global(Some(timeout))
                .build()
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .send_json(&body)?
                .body_mut()
                .read_json()?;
            Ok(response)
        })?;

        if !response.errors.is_empty() {
            let message = response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            log::debug!("{field} failed: {message}");
            return Err(Error::Remote(message));
        }

        response
            .data
            .and_then(|mut data| data.get_mut(field).map(Value::take))
            .ok_or_else(|| Error::InvalidResponse(format!("response has no data.{field}")))
    }

    /// Decode an entity, treating `null` as "not found".
    fn entity<T: DeserializeOwned>(
        value: Value,
        kind: &'static str,
        key: impl std::fmt::Display,
    ) -> Result<T> {
        if value.is_null() {
            return Err(Error::not_found(kind, key));
        }
        Ok(serde_json::from_value(value)?)
    }

    fn uuid(value: Value, kind: &'static str, key: impl std::fmt::Display) -> Result<Uuid> {
        Self::entity(value, kind, key)
    }
}

/// Timeout for one request: the agent's own, cut short by the token's deadline.
fn request_timeout(timeout: Duration, cancel: &CancelToken) -> Duration {
    cancel.remaining().map_or(timeout, |left| left.min(timeout))
}

fn group_variables(group: &GroupRef) -> Value {
    match group {
        GroupRef::Id(id) => json!({ "scriptGroupId": id }),
        GroupRef::AltId { provider, alt_id } => {
            json!({ "providerId": provider, "scriptGroupAltId": alt_id })
        }
    }
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

impl Backend for GraphqlBackend {
    fn create_provider(
        &self,
        input: &CreateProviderInput,
        cancel: &CancelToken,
    ) -> Result<IssuedProvider> {
        let query = "mutation CreateProvider($input: CreateProviderInput!) { \
                     createProvider(input: $input) { uuid apiKey secretKey } }"
            .to_string();
        let value = self.execute(query, "createProvider", json!({ "input": input }), cancel)?;
        let keys: IssuedKeys = serde_json::from_value(value)?;
        let uuid = keys
            .uuid
            .ok_or_else(|| Error::InvalidResponse("createProvider returned no uuid".into()))?;
        Ok(IssuedProvider {
            uuid,
            credentials: keys.credentials(),
        })
    }

    fn read_provider(&self, id: Uuid, cancel: &CancelToken) -> Result<ProviderProfile> {
        let query = format!("query Provider($id: UUID!) {{ provider(id: $id) {{ {PROVIDER_FIELDS} }} }}");
        let value = self.execute(query, "provider", json!({ "id": id }), cancel)?;
        Self::entity(value, "provider", id)
    }

    fn update_provider(
        &self,
        id: Uuid,
        input: &UpdateProviderInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "mutation UpdateProvider($id: UUID!, $input: UpdateProviderInput!) { \
                     updateProvider(id: $id, input: $input) }"
            .to_string();
        let value = self.execute(
            query,
            "updateProvider",
            json!({ "id": id, "input": input }),
            cancel,
        )?;
        Self::uuid(value, "provider", id)
    }

    fn set_provider_public(&self, id: Uuid, public: bool, cancel: &CancelToken) -> Result<()> {
        let query = "mutation SetProviderPublic($id: UUID!, $public: Boolean!) { \
                     setProviderPublic(id: $id, public: $public) }"
            .to_string();
        self.execute(
            query,
            "setProviderPublic",
            json!({ "id": id, "public": public }),
            cancel,
        )?;
        Ok(())
    }

    fn reset_provider_keys(&self, id: Uuid, cancel: &CancelToken) -> Result<Credentials> {
        let query = "mutation ResetProviderKeys($id: UUID!) { \
                     resetProviderKeys(id: $id) { apiKey secretKey } }"
            .to_string();
        let value = self.execute(query, "resetProviderKeys", json!({ "id": id }), cancel)?;
        if value.is_null() {
            return Err(Error::not_found("provider", id));
        }
        let keys: IssuedKeys = serde_json::from_value(value)?;
        Ok(keys.credentials())
    }

    fn resolve_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "query ScriptGroupByAltId($providerId: UUID!, $altId: String!) { \
                     scriptGroupByAltId(providerId: $providerId, altId: $altId) { uuid } }"
            .to_string();
        let value = self.execute(
            query,
            "scriptGroupByAltId",
            json!({ "providerId": provider, "altId": alt_id }),
            cancel,
        )?;
        let key = format!("{provider}/{alt_id}");
        let found: Value = Self::entity(value, "script group", &key)?;
        Self::uuid(found["uuid"].clone(), "script group", key)
    }

    fn create_script_group(
        &self,
        provider: Uuid,
        alt_id: &str,
        input: &CreateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "mutation CreateScriptGroup($providerId: UUID!, $altId: String!, \
                     $input: CreateScriptGroupInput!) { \
                     createScriptGroup(providerId: $providerId, altId: $altId, input: $input) }"
            .to_string();
        let value = self.execute(
            query,
            "createScriptGroup",
            json!({ "providerId": provider, "altId": alt_id, "input": input }),
            cancel,
        )?;
        Self::uuid(value, "script group", alt_id)
    }

    fn read_script_group(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptGroupProfile> {
        let query = format!(
            "query ScriptGroup($id: UUID!) {{ scriptGroup(id: $id) {{ {SCRIPT_GROUP_FIELDS} }} }}"
        );
        let value = self.execute(query, "scriptGroup", json!({ "id": id }), cancel)?;
        Self::entity(value, "script group", id)
    }

    fn update_script_group(
        &self,
        id: Uuid,
        input: &UpdateScriptGroupInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "mutation UpdateScriptGroup($id: UUID!, $input: UpdateScriptGroupInput!) { \
                     updateScriptGroup(id: $id, input: $input) }"
            .to_string();
        let value = self.execute(
            query,
            "updateScriptGroup",
            json!({ "id": id, "input": input }),
            cancel,
        )?;
        Self::uuid(value, "script group", id)
    }

    fn resolve_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "query ScriptByAltId($scriptGroupId: UUID, $providerId: UUID, \
                     $scriptGroupAltId: String, $altId: String!) { \
                     scriptByAltId(scriptGroupId: $scriptGroupId, providerId: $providerId, \
                     scriptGroupAltId: $scriptGroupAltId, altId: $altId) { uuid } }"
            .to_string();
        let variables = merge(group_variables(group), json!({ "altId": alt_id }));
        let value = self.execute(query, "scriptByAltId", variables, cancel)?;
        let key = format!("{group}/{alt_id}");
        let found: Value = Self::entity(value, "script", &key)?;
        Self::uuid(found["uuid"].clone(), "script", key)
    }

    fn create_script(
        &self,
        group: &GroupRef,
        alt_id: &str,
        input: &CreateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "mutation CreateScript($scriptGroupId: UUID, $providerId: UUID, \
                     $scriptGroupAltId: String, $altId: String!, $input: CreateScriptInput!) { \
                     createScript(scriptGroupId: $scriptGroupId, providerId: $providerId, \
                     scriptGroupAltId: $scriptGroupAltId, altId: $altId, input: $input) }"
            .to_string();
        let variables = merge(
            group_variables(group),
            json!({ "altId": alt_id, "input": input }),
        );
        let value = self.execute(query, "createScript", variables, cancel)?;
        Self::uuid(value, "script", alt_id)
    }

    fn read_script(&self, id: Uuid, cancel: &CancelToken) -> Result<ScriptProfile> {
        let query = format!("query Script($id: UUID!) {{ script(id: $id) {{ {SCRIPT_FIELDS} }} }}");
        let value = self.execute(query, "script", json!({ "id": id }), cancel)?;
        Self::entity(value, "script", id)
    }

    fn update_script(
        &self,
        id: Uuid,
        input: &UpdateScriptInput,
        cancel: &CancelToken,
    ) -> Result<Uuid> {
        let query = "mutation UpdateScript($id: UUID!, $input: UpdateScriptInput!) { \
                     updateScript(id: $id, input: $input) }"
            .to_string();
        let value = self.execute(
            query,
            "updateScript",
            json!({ "id": id, "input": input }),
            cancel,
        )?;
        Self::uuid(value, "script", id)
    }
}
