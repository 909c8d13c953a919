#![forbid(unsafe_code)]

//! Lifecycle runtime.
//!
//! A [`Lifecycle`] owns the current [`Options`](cyclekit_options::Options)
//! and a [`Cache`](cyclekit_cache::Cache), and calls a single
//! [`LifecycleHandler`] whenever a cycle detects a change in either.
//!
//! # States
//!
//! - **Constructing**: a [`LifecycleBuilder`]. Nothing has been validated or
//!   computed yet.
//! - **Active**: a built [`Lifecycle`]. Building resolves the template,
//!   initializes the options, and runs one forced cycle, so the handler has
//!   seen a complete state before any other call is possible.
//!
//! # Invariants
//!
//! 1. Every public state-changing call runs exactly one cycle. A `null`
//!    partial passed to `set_options` is a read, not a state change.
//! 2. A cycle invokes the handler at most once, and only if the options
//!    change set or the cache change set is non-empty.
//! 3. The options key set always equals the template's key set.

pub mod config;
pub mod error;
pub mod hints;
pub mod lifecycle;

pub use config::LifecycleConfig;
pub use error::{LifecycleError, Result};
pub use hints::UpdateHints;
pub use lifecycle::{Lifecycle, LifecycleBuilder, LifecycleHandler, OptionChanges, Update};
