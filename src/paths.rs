//! Path resolution for scribae
//!
//! # Environment Variables
//!
//! - `SCRIBAE_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/scribae`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `SCRIBAE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/scribae` (if set)
//! 3. `~/.config/scribae`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SCRIBAE_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Extension given to state files derived from a manifest path
pub const STATE_EXTENSION: &str = "state.json";

/// Get the scribae config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("scribae");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("scribae");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// State file used for a manifest when none is given: `site.toml` -> `site.state.json`
pub fn default_state_path(manifest: &Path) -> PathBuf {
    manifest.with_extension(STATE_EXTENSION)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, PoisonError};

    /// Serialises tests that touch the config env vars.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        with_env_var(ENV_CONFIG_DIR, "/custom/scribae", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/scribae"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/scribae/config.toml")
            );
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let home = dirs::home_dir().unwrap();
        let expected = home.join("dotfiles").join("scribae-tilde-test");
        with_env_var(ENV_CONFIG_DIR, "~/dotfiles/scribae-tilde-test", || {
            assert_eq!(config_dir().unwrap(), expected);
        });
    }

    #[test]
    fn test_xdg_config_home() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        without_env_var(ENV_CONFIG_DIR, || {
            with_env_var("XDG_CONFIG_HOME", "/tmp/xdg-config-test", || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-config-test/scribae")
                );
            });
        });
    }

    #[test]
    fn test_default_state_path() {
        assert_eq!(
            default_state_path(Path::new("infra/acme.toml")),
            PathBuf::from("infra/acme.state.json")
        );
        assert_eq!(
            default_state_path(Path::new("script")),
            PathBuf::from("script.state.json")
        );
    }

    #[test]
    fn test_expand_with_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/test/path"), home.join("test").join("path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
