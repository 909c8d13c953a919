#![forbid(unsafe_code)]

//! Cyclekit public facade crate.
//!
//! Validated options, change-tracking caches, and the lifecycle that
//! coalesces both into one notification per cycle.

pub use cyclekit_cache as cache;
pub use cyclekit_options as options;
#[cfg(feature = "runtime")]
pub use cyclekit_runtime as runtime;

pub mod prelude {
    pub use cyclekit_cache::{Cache, CacheError, CacheSpec, ChangeSet, Refresh};
    pub use cyclekit_options::{Options, OptionsDecl, Rule, ValueKinds, Verdict};
    #[cfg(feature = "runtime")]
    pub use cyclekit_runtime::{
        Lifecycle, LifecycleConfig, LifecycleError, LifecycleHandler, Update, UpdateHints,
    };

    pub use cyclekit_cache as cache;
    pub use cyclekit_options as options;
    #[cfg(feature = "runtime")]
    pub use cyclekit_runtime as runtime;
}
