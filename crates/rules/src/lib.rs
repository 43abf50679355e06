//! # Rules
//!
//! Validation for declarative entity records.
//!
//! - [`Value`] and [`Record`]: raw field values as supplied by a manifest
//! - [`Rule`]: a single-field check producing [`Violation`]s
//! - [`ExclusiveGroup`]: a cross-field "at most one" / "exactly one" constraint
//!
//! Nothing in this crate performs I/O; every check is a pure function of its
//! input, so the same rules run before any remote call is attempted.
//!
//! ## Example
//!
//! ```
//! use rules::{AltId, Rule, Value};
//!
//! let rule = AltId { required: true };
//! assert!(rule.validate("alt_id", &Value::from("my_script_1")).is_empty());
//! assert_eq!(rule.validate("alt_id", &Value::from("_abc")).len(), 1);
//! ```

pub mod group;
pub mod rule;
pub mod value;

pub use group::{ExclusiveGroup, validate_group};
pub use rule::{
    AltId, BoundedInt, BoxedRule, Color, Length, Recurrence, Reference, Rule, Url, Uuid,
    Violation, check_alt_id,
};
pub use value::{Record, Value};
