//! Core types for the remote entity API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Secrets and credentials
// ============================================================================

/// A secret string that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// API credentials issued for a provider profile.
///
/// The remote system reveals these exactly once (on creation or key reset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<Secret>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(Secret::new(api_key)),
            secret_key: Some(Secret::new(secret_key)),
        }
    }

    /// Whether both keys are present and non-empty.
    pub fn is_complete(&self) -> bool {
        let filled = |s: &Option<Secret>| s.as_ref().is_some_and(|s| !s.is_empty());
        filled(&self.api_key) && filled(&self.secret_key)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Billing recurrence of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Lifetime,
    Yearly,
    Monthly,
    Weekly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lifetime => "lifetime",
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifetime" => Ok(Self::Lifetime),
            "yearly" => Ok(Self::Yearly),
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            _ => Err(format!("unknown recurrence: {s}")),
        }
    }
}

/// Reference to a script group: by UUID, or by alt id within a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupRef {
    Id(Uuid),
    AltId { provider: Uuid, alt_id: String },
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::AltId { provider, alt_id } => write!(f, "{provider}/{alt_id}"),
        }
    }
}

// ============================================================================
// Provider profiles
// ============================================================================

/// Remote view of a provider profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub uuid: Uuid,
    #[serde(default)]
    pub alt_id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub public: bool,
    pub account_service: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub public: bool,
    pub account_service: bool,
}

/// Partial update; `None` leaves the remote value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_service: Option<bool>,
}

/// A newly created provider with its one-time credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedProvider {
    pub uuid: Uuid,
    pub credentials: Credentials,
}

// ============================================================================
// Script groups
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptGroupProfile {
    pub uuid: Uuid,
    pub provider_id: Uuid,
    pub alt_id: String,
    pub name: String,
    pub description: String,
    pub public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptGroupInput {
    pub name: String,
    pub description: String,
    pub public: bool,
}

/// Partial update; `None` leaves the remote value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScriptGroupInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

// ============================================================================
// Scripts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptProfile {
    pub uuid: Uuid,
    pub script_group_id: Uuid,
    pub alt_id: String,
    pub name: String,
    pub description: String,
    pub recurrence: Recurrence,
    pub price_in_cents: u32,
    pub sla_sec: u32,
    pub token_lifetime_sec: u32,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptInput {
    pub name: String,
    pub description: String,
    pub recurrence: Recurrence,
    pub price_in_cents: u32,
    pub sla_sec: u32,
    pub token_lifetime_sec: u32,
    pub public: bool,
}

/// Partial update; `None` leaves the remote value unchanged.
///
/// Recurrence is fixed at creation and cannot be updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScriptInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_in_cents: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_lifetime_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}
