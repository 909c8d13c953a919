#![forbid(unsafe_code)]

//! Options: declarative templates, per-key validation, and deep merging.
//!
//! An option set is declared once as an [`OptionsDecl`] (defaults plus
//! [`Rule`]s). Resolving it yields an immutable [`OptionsTemplate`] and the
//! default values. Incoming partial options are then sanitized against the
//! template with [`initialize`] (construction time, merged over defaults)
//! or [`revalidate`] (later calls, deduplicated against the previous values).
//!
//! # Invariants
//!
//! 1. An [`Options`] built by [`Options::initialize`] has exactly the
//!    template's key set, recursively for groups.
//! 2. A rejected key never aborts validation of its siblings.
//! 3. [`revalidate`] only reports keys whose sanitized value differs from
//!    the previous value.

pub mod merge;
pub mod options;
pub mod rule;
pub mod template;
pub mod validate;

pub use merge::{assign_deep, merged};
pub use options::Options;
pub use rule::{Rule, ValueKinds, Verdict};
pub use template::{OptionDecl, OptionsDecl, OptionsTemplate, Resolved, TemplateError, TemplateNode};
pub use validate::{
    Initialized, RejectReason, Rejection, Revalidated, initialize, revalidate, same_value,
};

/// JSON object type used for option trees.
pub type Map = serde_json::Map<String, serde_json::Value>;
