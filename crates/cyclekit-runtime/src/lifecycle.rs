#![forbid(unsafe_code)]

//! The lifecycle orchestrator.
//!
//! # Design
//!
//! Two independently typed domains are diffed per cycle:
//!
//! - **options**: validated, externally supplied JSON values. The live tree
//!   is [`Options`]; a `ChangeTracker<String, Value>` remembers what the
//!   handler last saw for each top-level key.
//! - **cache**: internally computed values in a [`Cache<K, V>`].
//!
//! Every cycle refreshes the cache first, then re-diffs the options, then
//! calls the handler once if either reported a change.
//!
//! # Failure Modes
//!
//! - **Invalid option value**: dropped per key, logged as
//!   `options.rejected`; the call still succeeds.
//! - **Compute failure**: the cycle aborts with [`LifecycleError::Cache`]
//!   before the options are diffed and before the handler runs. Cache keys
//!   recomputed earlier in that cycle stay committed.

use std::fmt;
use std::hash::Hash;

use cyclekit_cache::{Cache, CacheSpec, ChangeSet, ChangeTracker, Refresh};
use cyclekit_options::{
    Map, Options, OptionsDecl, OptionsTemplate, Rejection, Revalidated, revalidate, same_value,
};
use serde::Serialize;
use serde_json::Value;
use tracing::span::EnteredSpan;

use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::hints::{CyclePlan, UpdateHints};

/// Change set over top-level option keys.
pub type OptionChanges = ChangeSet<String, Value>;

/// Everything the handler learns about one cycle.
#[derive(Debug)]
pub struct Update<'a, K, V> {
    /// Top-level option keys that changed.
    pub options: &'a OptionChanges,
    /// Cache keys that changed.
    pub cache: &'a ChangeSet<K, V>,
    /// Full option tree after the cycle.
    pub current: &'a Options,
    /// 1-based cycle number.
    pub cycle: u64,
}

impl<K: PartialEq, V> Update<'_, K, V> {
    /// Whether this cycle was forced.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.options.is_forced() || self.cache.is_forced()
    }

    #[must_use]
    pub fn option_changed(&self, key: &str) -> bool {
        self.options.keys().any(|k| k == key)
    }

    #[must_use]
    pub fn cache_changed(&self, key: &K) -> bool {
        self.cache.contains(key)
    }
}

/// Consumer of change notifications.
pub trait LifecycleHandler<K, V> {
    fn on_update(&mut self, update: &Update<'_, K, V>);
}

impl<K, V, F> LifecycleHandler<K, V> for F
where
    F: FnMut(&Update<'_, K, V>),
{
    fn on_update(&mut self, update: &Update<'_, K, V>) {
        self(update)
    }
}

/// A lifecycle under construction.
pub struct LifecycleBuilder<K, V> {
    decl: OptionsDecl,
    cache: CacheSpec<K, V>,
    initial: Option<Value>,
    config: LifecycleConfig,
}

impl<K, V> LifecycleBuilder<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone + 'static,
{
    /// Initial options, validated and merged over the defaults.
    #[must_use]
    pub fn initial_options(mut self, options: Value) -> Self {
        self.initial = Some(options);
        self
    }

    #[must_use]
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve, initialize, and run the first (forced) cycle.
    pub fn build<H>(self, handler: H) -> Result<Lifecycle<K, V, H>>
    where
        H: LifecycleHandler<K, V>,
    {
        let resolved = self.decl.resolve()?;
        let (options, rejected) = match &self.initial {
            None | Some(Value::Null) => Options::initialize(&Map::new(), &resolved),
            Some(Value::Object(candidate)) => Options::initialize(candidate, &resolved),
            Some(other) => {
                let (options, mut rejected) = Options::initialize(&Map::new(), &resolved);
                rejected.insert(0, Rejection::not_an_object("$", other));
                (options, rejected)
            }
        };
        report_rejections(&self.config, &rejected);

        let cache = self.cache.build()?;
        let mut options_diff: ChangeTracker<String, Value> = ChangeTracker::new();
        for key in resolved.template.keys() {
            options_diff.track(key.to_string(), Box::new(same_value));
        }

        let mut lifecycle = Lifecycle {
            template: resolved.template,
            options,
            options_diff,
            cache,
            handler,
            config: self.config,
            cycles: 0,
        };
        lifecycle.run(UpdateHints::force(true))?;
        Ok(lifecycle)
    }
}

/// Options, cache, and the handler notified when either changes.
pub struct Lifecycle<K, V, H> {
    template: OptionsTemplate,
    options: Options,
    options_diff: ChangeTracker<String, Value>,
    cache: Cache<K, V>,
    handler: H,
    config: LifecycleConfig,
    cycles: u64,
}

impl<K: fmt::Debug, V: fmt::Debug, H> fmt::Debug for Lifecycle<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("options", &self.options)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Lifecycle<(), (), ()> {
    /// Start building a lifecycle.
    #[must_use]
    pub fn builder<K, V>(decl: OptionsDecl, cache: CacheSpec<K, V>) -> LifecycleBuilder<K, V> {
        LifecycleBuilder {
            decl,
            cache,
            initial: None,
            config: LifecycleConfig::default(),
        }
    }
}

impl<K, V, H> Lifecycle<K, V, H>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
    H: LifecycleHandler<K, V>,
{
    /// Current, fully populated options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Validate `partial`, merge the accepted keys, and run one cycle.
    ///
    /// Invalid keys are dropped; this never fails. `null` means "no
    /// options": nothing is validated and no cycle runs.
    pub fn set_options(&mut self, partial: Value) -> &Options {
        let revalidated = match &partial {
            Value::Null => return &self.options,
            Value::Object(candidate) => {
                revalidate(candidate, &self.template, self.options.as_map())
            }
            other => Revalidated {
                rejected: vec![Rejection::not_an_object("$", other)],
                ..Revalidated::default()
            },
        };
        report_rejections(&self.config, &revalidated.rejected);
        self.options.apply(&revalidated);

        let plan = UpdateHints::<K>::options(revalidated.changed_keys).plan();
        let _span = self.cycle_span(&plan);
        self.finish(plan.options, plan.force, ChangeSet::new(plan.force));
        &self.options
    }

    /// [`set_options`](Self::set_options) for any serializable partial.
    pub fn set_options_from<T: Serialize>(&mut self, partial: &T) -> Result<&Options> {
        let value = serde_json::to_value(partial)?;
        Ok(self.set_options(value))
    }

    /// Run a cycle re-deriving everything; `force` is passed to every
    /// compute function.
    pub fn update(&mut self, force: bool) -> Result<()> {
        self.run(UpdateHints::force(force))
    }

    /// Run a cycle recomputing only the requested cache keys.
    pub fn update_cache(&mut self, refresh: Refresh<K>) -> Result<()> {
        self.run(UpdateHints::cache(refresh))
    }

    /// Run a cycle from explicit hints.
    pub fn cycle(&mut self, hints: UpdateHints<K>) -> Result<()> {
        self.run(hints)
    }

    /// Last computed value of a cache key.
    #[must_use]
    pub fn cache_value(&self, key: &K) -> Option<&V> {
        self.cache.get(key)
    }

    #[must_use]
    pub fn cache(&self) -> &Cache<K, V> {
        &self.cache
    }

    #[must_use]
    pub fn template(&self) -> &OptionsTemplate {
        &self.template
    }

    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Number of completed cycles, including the construction cycle.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn run(&mut self, hints: UpdateHints<K>) -> Result<()> {
        let plan = hints.plan();
        let _span = self.cycle_span(&plan);
        let cache_changes = self.cache.update(plan.cache, plan.force)?;
        self.finish(plan.options, plan.force, cache_changes);
        Ok(())
    }

    fn cycle_span<T>(&self, plan: &CyclePlan<T>) -> EnteredSpan {
        tracing::debug_span!(
            "lifecycle.cycle",
            cycle = self.cycles + 1,
            force = plan.force,
            label = self.config.label()
        )
        .entered()
    }

    /// Diff the options, then notify if anything changed.
    fn finish(&mut self, options: Refresh<String>, force: bool, cache_changes: ChangeSet<K, V>) {
        let current = &self.options;
        let option_changes = self.options_diff.diff(options, force, |key, _, _| {
            current.get(key).cloned().unwrap_or(Value::Null)
        });
        self.cycles += 1;

        if !option_changes.anything_changed() && !cache_changes.anything_changed() {
            tracing::trace!(message = "lifecycle.skip", cycle = self.cycles);
            return;
        }
        tracing::debug!(
            message = "lifecycle.notify",
            cycle = self.cycles,
            options_changed = option_changes.len(),
            cache_changed = cache_changes.len()
        );
        self.handler.on_update(&Update {
            options: &option_changes,
            cache: &cache_changes,
            current: &self.options,
            cycle: self.cycles,
        });
    }
}

fn report_rejections(config: &LifecycleConfig, rejected: &[Rejection]) {
    if !config.warn_on_rejected {
        return;
    }
    for rejection in rejected {
        tracing::warn!(
            message = "options.rejected",
            path = %rejection.path,
            reason = %rejection.reason,
            label = config.label()
        );
    }
}
