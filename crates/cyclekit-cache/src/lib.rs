#![forbid(unsafe_code)]

//! Change-tracking caches.
//!
//! - [`ChangeTracker`]: the generic diff core. Stores the last value per key,
//!   re-derives requested keys, and reports what changed as a [`ChangeSet`].
//! - [`Cache`]: a tracker bound to per-key compute functions declared in a
//!   [`CacheSpec`].
//!
//! # Invariants
//!
//! 1. A stored value is either a seed (before the first refresh) or a result
//!    of the key's own derive/compute function.
//! 2. A [`ChangeSet`] never lists a key twice and lists only keys whose new
//!    value differs from the stored one (or that had no stored value).
//! 3. A forced refresh re-derives every tracked key.

pub mod cache;
pub mod change_set;
pub mod error;
pub mod tracker;

pub use cache::{Cache, CacheSpec, ComputeFn};
pub use change_set::{Change, ChangeSet, Refresh};
pub use error::{BoxError, CacheError};
pub use tracker::{ChangeTracker, EqualFn};
