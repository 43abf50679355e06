//! Desired-state manifests.
//!
//! A manifest describes one entity:
//!
//! ```toml
//! kind = "script"
//!
//! [fields]
//! provider_id = "67e55044-10b1-426f-9247-bb680e5fe0c8"
//! script_group_id = "tools"
//! alt_id = "summarize"
//! name = "Summarize"
//! description = "Summarizes text"
//! recurrence = "monthly"
//! price_in_cents = 100
//! sla_sec = 2400
//! token_lifetime_sec = 600
//! public = true
//! ```

use anyhow::{Context, Result};
use reconcile::EntityKind;
use rules::{Record, Value};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Problems with a manifest's shape (field rules are checked later).
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("unknown kind '{0}' (expected provider, script_group or script)")]
    UnknownKind(String),

    #[error("field '{field}' has unsupported {found} value (use a string, integer or boolean)")]
    UnsupportedValue { field: String, found: &'static str },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    kind: String,
    #[serde(default)]
    fields: toml::Table,
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub kind: EntityKind,
    pub fields: Record,
}

fn convert(field: &str, value: toml::Value) -> Result<Value, ManifestError> {
    match value {
        toml::Value::String(s) => Ok(Value::Str(s)),
        toml::Value::Integer(n) => Ok(Value::Int(n)),
        toml::Value::Boolean(b) => Ok(Value::Bool(b)),
        other => Err(ManifestError::UnsupportedValue {
            field: field.to_string(),
            found: other.type_str(),
        }),
    }
}

impl Manifest {
    /// Parse a manifest from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)?;
        let kind = raw
            .kind
            .parse::<EntityKind>()
            .map_err(|_| ManifestError::UnknownKind(raw.kind.clone()))?;

        let mut fields = Record::new();
        for (name, value) in raw.fields {
            let value = convert(&name, value)?;
            fields.set(name, value);
        }

        Ok(Self { kind, fields })
    }

    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        log::debug!(
            "Loaded {} manifest with {} fields from {}",
            manifest.kind.as_str(),
            manifest.fields.len(),
            path.display()
        );
        Ok(manifest)
    }
}
