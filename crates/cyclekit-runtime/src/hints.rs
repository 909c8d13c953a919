#![forbid(unsafe_code)]

//! Update hints: what a single cycle should re-derive.

use cyclekit_cache::Refresh;

/// Request shape for one cycle.
///
/// | hints                          | cache refresh      | options re-diff |
/// |--------------------------------|--------------------|-----------------|
/// | `force: Some(true)`            | all, forced        | all, forced     |
/// | `force: Some(false)`           | `changed_cache` or all | `changed_options` or all |
/// | `force: None`                  | `changed_cache` or nothing | `changed_options` or nothing |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHints<K> {
    pub force: Option<bool>,
    pub changed_options: Option<Vec<String>>,
    pub changed_cache: Option<Refresh<K>>,
}

impl<K> Default for UpdateHints<K> {
    fn default() -> Self {
        Self {
            force: None,
            changed_options: None,
            changed_cache: None,
        }
    }
}

/// Resolved refresh requests for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CyclePlan<K> {
    pub(crate) force: bool,
    pub(crate) cache: Refresh<K>,
    pub(crate) options: Refresh<String>,
}

impl<K> UpdateHints<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hints for `update(force)`.
    #[must_use]
    pub fn force(force: bool) -> Self {
        Self::new().with_force(force)
    }

    /// Hints for an options change.
    #[must_use]
    pub fn options(keys: Vec<String>) -> Self {
        Self::new().with_changed_options(keys)
    }

    /// Hints for a cache refresh.
    #[must_use]
    pub fn cache(refresh: Refresh<K>) -> Self {
        Self::new().with_changed_cache(refresh)
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    #[must_use]
    pub fn with_changed_options(mut self, keys: Vec<String>) -> Self {
        self.changed_options = Some(keys);
        self
    }

    #[must_use]
    pub fn with_changed_cache(mut self, refresh: Refresh<K>) -> Self {
        self.changed_cache = Some(refresh);
        self
    }

    pub(crate) fn plan(self) -> CyclePlan<K> {
        let force = self.force == Some(true);
        if force {
            return CyclePlan {
                force,
                cache: Refresh::All,
                options: Refresh::All,
            };
        }
        // An explicit `force: Some(false)` still re-derives everything, just
        // without the force flag.
        let explicit = self.force.is_some();
        let cache = match self.changed_cache {
            Some(refresh) => refresh,
            None if explicit => Refresh::All,
            None => Refresh::Nothing,
        };
        let options = match self.changed_options {
            Some(keys) => Refresh::Keys(keys),
            None if explicit => Refresh::All,
            None => Refresh::Nothing,
        };
        CyclePlan {
            force,
            cache,
            options,
        }
    }
}
