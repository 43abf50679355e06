//! # Reconcile
//!
//! Converges one remote entity (provider profile, script group or script) to
//! a desired field record.
//!
//! ## Core Concepts
//!
//! - **Schema**: per-kind field table feeding the rules in the `rules` crate
//! - **Identity**: how an entity is addressed (uuid, or alt id within a parent)
//! - **EntityAdapter**: create/read/update/visibility for one kind
//! - **Reconciler**: decides create, adopt, update or soft delete and runs it
//! - **CanonicalState**: what the remote confirmed, plus held credentials
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use reconcile::{EntityKind, Reconciler};
//! use remote::{CancelToken, Client, MockBackend};
//! use rules::Record;
//!
//! let client = Client::with_backend(Arc::new(MockBackend::new()));
//! let desired = Record::new()
//!     .with("name", "Acme")
//!     .with("description", "Acme scripts");
//!
//! let outcome = Reconciler::new(&client)
//!     .apply(EntityKind::Provider, None, Some(&desired), &CancelToken::new())
//!     .unwrap()
//!     .unwrap();
//! assert!(outcome.state.credentials.is_some());
//! ```

pub mod adapter;
pub mod error;
pub mod identity;
pub mod plan;
pub mod reconciler;
pub mod schema;
pub mod state;

pub use adapter::{EntityAdapter, Issued, adapter_for};
pub use error::{Error, ErrorCategory, Result};
pub use identity::{Address, EntityKind, Identity};
pub use plan::{FieldChange, Plan, Transition, changes, decide};
pub use reconciler::{Outcome, Reconciler};
pub use schema::{FieldSpec, FieldType, Mode, Presence, Schema, schema};
pub use state::{Binding, CanonicalState};
