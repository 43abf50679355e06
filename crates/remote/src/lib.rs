//! # remote
//!
//! Blocking client for the remote entity API: provider profiles, script
//! groups and scripts.
//!
//! This crate provides:
//! - The [`Backend`] trait: one synchronous call per remote operation
//! - [`GraphqlBackend`]: the hosted GraphQL API over HTTP
//! - [`MockBackend`]: an in-memory API with a call journal, for tests
//! - [`CancelToken`]: cooperative cancellation with optional deadlines
//!
//! ## Example
//!
//! ```no_run
//! use remote::{CancelToken, Client, ClientConfig};
//!
//! let client = Client::new(&ClientConfig {
//!     api_token: "token".to_string(),
//!     ..ClientConfig::default()
//! });
//!
//! let profile = client
//!     .backend()
//!     .read_provider(uuid::Uuid::nil(), &CancelToken::new())
//!     .expect("read failed");
//! println!("{}", profile.name);
//! ```

pub mod backend;
pub mod cancel;
pub mod error;
pub mod types;

pub use backend::graphql::GraphqlBackend;
pub use backend::{Backend, Call, MockBackend};
pub use cancel::{CancelToken, run_cancellable};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    CreateProviderInput, CreateScriptGroupInput, CreateScriptInput, Credentials, GroupRef,
    IssuedProvider, ProviderProfile, Recurrence, ScriptGroupProfile, ScriptProfile, Secret,
    UpdateProviderInput, UpdateScriptGroupInput, UpdateScriptInput,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.myscribae.com";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`Client::new`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"****")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Shared handle to a backend.
///
/// Passed explicitly to everything that talks to the API; cloning is cheap.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
}

impl Client {
    /// Create a client for the hosted GraphQL API.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        log::debug!("Using API at {}", config.api_url);
        Self {
            backend: Arc::new(GraphqlBackend::new(
                config.api_url.clone(),
                config.api_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The backend every call goes through.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}
