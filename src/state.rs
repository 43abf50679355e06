//! State files: one canonical state per manifest, stored as pretty JSON.

use anyhow::{Context, Result};
use reconcile::CanonicalState;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Load a state file, or `None` if it doesn't exist yet
pub fn load(path: &Path) -> Result<Option<CanonicalState>> {
    if !path.exists() {
        log::debug!("State file {} does not exist", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let state: CanonicalState = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

    log::debug!("Loaded state from {}", path.display());
    Ok(Some(state))
}

/// Load a state file that must exist
pub fn load_existing(path: &Path) -> Result<CanonicalState> {
    load(path)?.with_context(|| format!("No state file at {}", path.display()))
}

/// Write a file readable only by its owner; state files hold credentials.
fn write_private(path: &Path, content: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // The mode only applies to new files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content.as_bytes())
}

/// Save state to disk, creating parent directories as needed
pub fn save(path: &Path, state: &CanonicalState) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
    }

    let content =
        serde_json::to_string_pretty(state).context("Failed to serialize state to JSON")?;
    write_private(path, &(content + "\n"))
        .with_context(|| format!("Failed to write state file: {}", path.display()))?;

    log::debug!("Saved state to {}", path.display());
    Ok(())
}
