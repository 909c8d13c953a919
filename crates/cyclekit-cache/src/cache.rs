#![forbid(unsafe_code)]

//! Caches of internally computed values.
//!
//! A [`CacheSpec`] declares, per key, how to compute the value from the
//! force flag and the previous value. [`Cache::update`] recomputes the
//! requested keys and returns the [`ChangeSet`] of keys whose value changed.
//!
//! # Failure Modes
//!
//! - **Unknown key requested**: the request is rejected as a whole
//!   ([`CacheError::UnknownKey`]) and nothing is recomputed.
//! - **Compute function fails**: the update aborts with
//!   [`CacheError::Compute`]. Keys recomputed earlier in the same update
//!   keep their new values.

use std::fmt;
use std::hash::Hash;

use ahash::AHashMap;

use crate::change_set::{ChangeSet, Refresh};
use crate::error::{BoxError, CacheError, Result};
use crate::tracker::{ChangeTracker, EqualFn, RefreshError};

/// Compute function: `(force, previous) -> value`.
pub type ComputeFn<V> = Box<dyn FnMut(bool, Option<&V>) -> std::result::Result<V, BoxError>>;

struct Entry<K, V> {
    key: K,
    compute: ComputeFn<V>,
    equal: EqualFn<V>,
}

/// Declaration of a cache's keys, compute functions, and optional seeds.
pub struct CacheSpec<K, V> {
    entries: Vec<Entry<K, V>>,
    seeds: Vec<(K, V)>,
}

impl<K, V> Default for CacheSpec<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            seeds: Vec::new(),
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for CacheSpec<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSpec")
            .field("keys", &self.entries.iter().map(|e| &e.key).collect::<Vec<_>>())
            .field("seeds", &self.seeds.len())
            .finish()
    }
}

impl<K, V> CacheSpec<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key with an infallible compute function.
    #[must_use]
    pub fn key(self, key: K, mut compute: impl FnMut(bool, Option<&V>) -> V + 'static) -> Self
    where
        V: PartialEq,
    {
        self.key_with_eq(
            key,
            move |force: bool, previous: Option<&V>| Ok(compute(force, previous)),
            |a: &V, b: &V| a == b,
        )
    }

    /// Declare a key whose compute function can fail.
    #[must_use]
    pub fn try_key<E>(
        self,
        key: K,
        mut compute: impl FnMut(bool, Option<&V>) -> std::result::Result<V, E> + 'static,
    ) -> Self
    where
        V: PartialEq,
        E: Into<BoxError>,
    {
        self.key_with_eq(
            key,
            move |force: bool, previous: Option<&V>| compute(force, previous).map_err(Into::into),
            |a: &V, b: &V| a == b,
        )
    }

    /// Declare a key with a custom equality rule.
    #[must_use]
    pub fn key_with_eq(
        mut self,
        key: K,
        compute: impl FnMut(bool, Option<&V>) -> std::result::Result<V, BoxError> + 'static,
        equal: impl Fn(&V, &V) -> bool + 'static,
    ) -> Self {
        self.entries.push(Entry {
            key,
            compute: Box::new(compute),
            equal: Box::new(equal),
        });
        self
    }

    /// Seed `key` with a value standing in for "previous" on the first update.
    #[must_use]
    pub fn seed(mut self, key: K, value: V) -> Self {
        self.seeds.push((key, value));
        self
    }

    /// Validate the declaration and build the cache.
    pub fn build(self) -> Result<Cache<K, V>> {
        let mut tracker = ChangeTracker::new();
        let mut computes = AHashMap::with_capacity(self.entries.len());
        for entry in self.entries {
            if !tracker.track(entry.key.clone(), entry.equal) {
                return Err(CacheError::DuplicateKey {
                    key: format!("{:?}", entry.key),
                });
            }
            computes.insert(entry.key, entry.compute);
        }
        for (key, value) in self.seeds {
            if !tracker.seed(&key, value) {
                return Err(CacheError::UnknownKey {
                    key: format!("{key:?}"),
                });
            }
        }
        Ok(Cache { tracker, computes })
    }
}

/// Keyed store of computed values.
pub struct Cache<K, V> {
    tracker: ChangeTracker<K, V>,
    computes: AHashMap<K, ComputeFn<V>>,
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cache").field(&self.tracker).finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    /// Recompute the requested keys (every key when `force` is set).
    pub fn update(&mut self, refresh: Refresh<K>, force: bool) -> Result<ChangeSet<K, V>> {
        let Self { tracker, computes } = self;
        tracker
            .refresh(refresh, force, |key, force, previous| {
                let compute = computes
                    .get_mut(key)
                    .expect("every tracked cache key has a compute function");
                compute(force, previous)
            })
            .map_err(|err| match err {
                RefreshError::UnknownKey(key) => CacheError::UnknownKey {
                    key: format!("{key:?}"),
                },
                RefreshError::Derive { key, source } => {
                    tracing::warn!(message = "cache.compute_failed", key = ?key, error = %source);
                    CacheError::Compute {
                        key: format!("{key:?}"),
                        source,
                    }
                }
            })
    }

    /// Last computed (or seeded) value of `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.tracker.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.tracker.contains(key)
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.tracker.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Size,
        Direction,
    }

    fn counting_spec(size: Rc<Cell<u32>>, calls: Rc<Cell<u32>>) -> CacheSpec<Key, u32> {
        let size_calls = Rc::clone(&calls);
        CacheSpec::new()
            .key(Key::Size, move |_, _| {
                size_calls.set(size_calls.get() + 1);
                size.get()
            })
            .key(Key::Direction, |_, _| 0)
    }

    #[test]
    fn forced_update_computes_every_key() {
        let size = Rc::new(Cell::new(10));
        let calls = Rc::new(Cell::new(0));
        let mut cache = counting_spec(Rc::clone(&size), Rc::clone(&calls))
            .build()
            .expect("valid spec");
        let changes = cache.update(Refresh::Nothing, true).expect("update");
        assert_eq!(changes.len(), 2);
        assert_eq!(cache.get(&Key::Size), Some(&10));
        assert_eq!(calls.get(), 1);

        let changes = cache.update(Refresh::Nothing, true).expect("update");
        assert!(changes.is_empty());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn partial_update_touches_only_listed_keys() {
        let size = Rc::new(Cell::new(10));
        let calls = Rc::new(Cell::new(0));
        let mut cache = counting_spec(Rc::clone(&size), Rc::clone(&calls))
            .build()
            .expect("valid spec");
        cache.update(Refresh::All, true).expect("update");
        size.set(20);

        let changes = cache.update(Refresh::keys([Key::Direction]), false).expect("update");
        assert!(changes.is_empty());
        assert_eq!(cache.get(&Key::Size), Some(&10));

        let changes = cache.update(Refresh::keys([Key::Size]), false).expect("update");
        let change = changes.get(&Key::Size).expect("size changed");
        assert_eq!((change.value, change.previous), (20, Some(10)));
    }

    #[test]
    fn compute_sees_force_flag_and_previous() {
        let seen = Rc::new(Cell::new((false, None)));
        let record = Rc::clone(&seen);
        let mut cache = CacheSpec::new()
            .key("n", move |force, previous: Option<&i64>| {
                record.set((force, previous.copied()));
                previous.copied().unwrap_or(0) + 1
            })
            .build()
            .expect("valid spec");
        cache.update(Refresh::All, true).expect("update");
        assert_eq!(seen.get(), (true, None));
        cache.update(Refresh::All, false).expect("update");
        assert_eq!(seen.get(), (false, Some(1)));
        assert_eq!(cache.get(&"n"), Some(&2));
    }

    #[test]
    fn compute_failure_propagates_and_keeps_earlier_keys() {
        let mut cache = CacheSpec::new()
            .key("first", |_, _| 1)
            .try_key("second", |_, _| Err::<i32, _>("measurement unavailable"))
            .key("third", |_, _| 3)
            .build()
            .expect("valid spec");
        let err = cache.update(Refresh::All, true).unwrap_err();
        assert!(matches!(err, CacheError::Compute { ref key, .. } if key == "\"second\""));
        assert!(!err.is_config());
        assert!(err.to_string().contains("measurement unavailable"));
        assert_eq!(cache.get(&"first"), Some(&1));
        assert_eq!(cache.get(&"third"), None);
    }

    #[test]
    fn unknown_key_is_a_precondition_violation() {
        let mut cache = CacheSpec::new()
            .key("a", |_, _| 1)
            .build()
            .expect("valid spec");
        let err = cache.update(Refresh::keys(["a", "b"]), false).unwrap_err();
        assert!(matches!(err, CacheError::UnknownKey { .. }));
        assert!(err.is_config());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn duplicate_key_fails_build() {
        let err = CacheSpec::new()
            .key("a", |_, _| 1)
            .key("a", |_, _| 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::DuplicateKey { .. }));
    }

    #[test]
    fn seed_for_undeclared_key_fails_build() {
        let err = CacheSpec::new()
            .key("a", |_, _| 1)
            .seed("b", 1)
            .build()
            .unwrap_err();
        assert_eq!(err.key(), "\"b\"");
    }

    #[test]
    fn seed_suppresses_equal_first_compute() {
        let mut cache = CacheSpec::new()
            .key("a", |_, _| 1)
            .key("b", |_, _| 2)
            .seed("a", 1)
            .seed("b", 0)
            .build()
            .expect("valid spec");
        assert_eq!(cache.get(&"a"), Some(&1));
        let changes = cache.update(Refresh::Nothing, true).expect("update");
        let b = changes.get(&"b").expect("b differs from seed");
        assert_eq!(b.previous, Some(0));
        assert!(!changes.contains(&"a"));
    }

    #[test]
    fn custom_equality_rule() {
        let value = Rc::new(Cell::new(1.0_f64));
        let source = Rc::clone(&value);
        let mut cache = CacheSpec::new()
            .key_with_eq(
                "ratio",
                move |_, _| Ok(source.get()),
                |a: &f64, b: &f64| (a - b).abs() < 0.01,
            )
            .build()
            .expect("valid spec");
        cache.update(Refresh::All, true).expect("update");
        value.set(1.001);
        assert!(cache.update(Refresh::All, false).expect("update").is_empty());
        value.set(1.5);
        assert_eq!(cache.update(Refresh::All, false).expect("update").len(), 1);
    }
}
