#![forbid(unsafe_code)]

//! Generic diff-and-report core shared by every tracked domain.
//!
//! # Design
//!
//! [`ChangeTracker<K, V>`] owns one slot per declared key: the last value
//! and the equality rule used to decide whether a re-derived value is new.
//! The derive function is supplied per refresh rather than stored, so the
//! same tracker serves domains whose values are read from external state
//! (options) as well as domains with stored compute functions ([`Cache`]).
//!
//! # Invariants
//!
//! 1. Keys are refreshed in declaration order for `All`/forced requests and
//!    in first-occurrence request order for explicit key lists.
//! 2. A key whose re-derived value is equal to the stored one is neither
//!    reported nor overwritten.
//! 3. A failing derive aborts the refresh; keys derived before it keep their
//!    new values.
//!
//! [`Cache`]: crate::Cache

use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

use ahash::AHashMap;

use crate::change_set::{Change, ChangeSet, Refresh};

/// Equality rule deciding whether a re-derived value counts as changed.
pub type EqualFn<V> = Box<dyn Fn(&V, &V) -> bool>;

struct Slot<K, V> {
    key: K,
    value: Option<V>,
    equal: EqualFn<V>,
}

/// Failure of [`ChangeTracker::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError<K, E> {
    /// A requested key is not tracked. Nothing was re-derived.
    UnknownKey(K),
    /// The derive function failed for `key`.
    Derive { key: K, source: E },
}

/// Keyed store that reports which values changed on each refresh.
pub struct ChangeTracker<K, V> {
    slots: Vec<Slot<K, V>>,
    index: AHashMap<K, usize>,
}

impl<K, V> Default for ChangeTracker<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: AHashMap::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ChangeTracker<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (&slot.key, &slot.value)))
            .finish()
    }
}

impl<K, V> ChangeTracker<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `key` with a custom equality rule. Returns `false` if the key
    /// was already tracked (the existing slot is kept).
    pub fn track(&mut self, key: K, equal: EqualFn<V>) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.slots.len());
        self.slots.push(Slot {
            key,
            value: None,
            equal,
        });
        true
    }

    /// Track `key` compared with `PartialEq`.
    pub fn track_eq(&mut self, key: K) -> bool
    where
        V: PartialEq + 'static,
    {
        self.track(key, Box::new(|a: &V, b: &V| a == b))
    }

    /// Store an initial value for `key` before its first derivation.
    /// Returns `false` if the key is not tracked.
    pub fn seed(&mut self, key: &K, value: V) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.slots[idx].value = Some(value);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Last stored value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index
            .get(key)
            .and_then(|&idx| self.slots[idx].value.as_ref())
    }

    /// Tracked keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.iter().map(|slot| &slot.key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Re-derive the requested keys and report the ones that changed.
    ///
    /// `force` overrides `refresh` and re-derives every key. Requests naming
    /// an untracked key are rejected before anything is derived.
    pub fn refresh<E, F>(
        &mut self,
        refresh: Refresh<K>,
        force: bool,
        derive: F,
    ) -> Result<ChangeSet<K, V>, RefreshError<K, E>>
    where
        F: FnMut(&K, bool, Option<&V>) -> Result<V, E>,
    {
        let indices = self.select(refresh, force).map_err(RefreshError::UnknownKey)?;
        self.run(&indices, force, derive)
            .map_err(|(key, source)| RefreshError::Derive { key, source })
    }

    /// Infallible refresh for derive functions that read from state owned
    /// next to the tracker. Requested keys that are not tracked are skipped.
    pub fn diff<F>(&mut self, refresh: Refresh<K>, force: bool, mut derive: F) -> ChangeSet<K, V>
    where
        F: FnMut(&K, bool, Option<&V>) -> V,
    {
        let refresh = match refresh {
            Refresh::Keys(keys) => {
                Refresh::Keys(keys.into_iter().filter(|k| self.contains(k)).collect())
            }
            other => other,
        };
        let indices = match self.select(refresh, force) {
            Ok(indices) => indices,
            Err(_) => Vec::new(),
        };
        match self.run(&indices, force, |key, force, previous| {
            Ok::<V, Infallible>(derive(key, force, previous))
        }) {
            Ok(changes) => changes,
            Err((_, never)) => match never {},
        }
    }

    fn select(&self, refresh: Refresh<K>, force: bool) -> Result<Vec<usize>, K> {
        if force {
            return Ok((0..self.slots.len()).collect());
        }
        match refresh {
            Refresh::Nothing => Ok(Vec::new()),
            Refresh::All => Ok((0..self.slots.len()).collect()),
            Refresh::Keys(keys) => {
                let mut seen = vec![false; self.slots.len()];
                let mut indices = Vec::with_capacity(keys.len());
                for key in keys {
                    let Some(&idx) = self.index.get(&key) else {
                        return Err(key);
                    };
                    if !seen[idx] {
                        seen[idx] = true;
                        indices.push(idx);
                    }
                }
                Ok(indices)
            }
        }
    }

    fn run<E, F>(
        &mut self,
        indices: &[usize],
        force: bool,
        mut derive: F,
    ) -> Result<ChangeSet<K, V>, (K, E)>
    where
        F: FnMut(&K, bool, Option<&V>) -> Result<V, E>,
    {
        let mut changes = ChangeSet::new(force);
        for &idx in indices {
            let slot = &mut self.slots[idx];
            let next = derive(&slot.key, force, slot.value.as_ref())
                .map_err(|err| (slot.key.clone(), err))?;
            let changed = slot
                .value
                .as_ref()
                .is_none_or(|current| !(slot.equal)(current, &next));
            tracing::trace!(message = "tracker.derive", key = ?slot.key, changed, force);
            if changed {
                let previous = slot.value.replace(next.clone());
                changes.push(Change {
                    key: slot.key.clone(),
                    value: next,
                    previous,
                });
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn tracker() -> ChangeTracker<&'static str, i32> {
        let mut t = ChangeTracker::new();
        assert!(t.track_eq("a"));
        assert!(t.track_eq("b"));
        assert!(t.track_eq("c"));
        t
    }

    fn constant(value: i32) -> impl FnMut(&&'static str, bool, Option<&i32>) -> i32 {
        move |_, _, _| value
    }

    #[test]
    fn first_refresh_reports_every_key() {
        let mut t = tracker();
        let changes = t.diff(Refresh::All, false, constant(1));
        assert_eq!(changes.keys().copied().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(changes.iter().all(|c| c.previous.is_none()));
    }

    #[test]
    fn equal_values_are_not_reported() {
        let mut t = tracker();
        t.diff(Refresh::All, true, constant(1));
        let changes = t.diff(Refresh::All, true, constant(1));
        assert!(!changes.anything_changed());
        assert!(changes.is_forced());
    }

    #[test]
    fn nothing_without_force_derives_nothing() {
        let mut t = tracker();
        let calls = Cell::new(0);
        let changes = t.diff(Refresh::Nothing, false, |_, _, _| {
            calls.set(calls.get() + 1);
            1
        });
        assert!(changes.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn force_overrides_nothing() {
        let mut t = tracker();
        let calls = Cell::new(0);
        t.diff(Refresh::Nothing, true, |_, force, _| {
            assert!(force);
            calls.set(calls.get() + 1);
            1
        });
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn keys_refresh_only_listed_in_request_order() {
        let mut t = tracker();
        t.diff(Refresh::All, true, constant(0));
        let changes = t.diff(Refresh::keys(["c", "a", "c"]), false, constant(5));
        assert_eq!(changes.keys().copied().collect::<Vec<_>>(), vec!["c", "a"]);
        assert_eq!(t.get(&"b"), Some(&0));
        assert_eq!(t.get(&"c"), Some(&5));
        assert_eq!(changes.get(&"a").and_then(|c| c.previous), Some(0));
    }

    #[test]
    fn derive_receives_previous_value() {
        let mut t = tracker();
        t.diff(Refresh::All, true, constant(10));
        let changes = t.diff(Refresh::keys(["b"]), false, |_, _, previous| {
            previous.copied().unwrap_or_default() + 1
        });
        let b = changes.get(&"b").expect("b changed");
        assert_eq!((b.value, b.previous), (11, Some(10)));
    }

    #[test]
    fn unknown_key_rejects_whole_request() {
        let mut t = tracker();
        let calls = Cell::new(0);
        let err = t
            .refresh(Refresh::keys(["a", "zzz"]), false, |_, _, _| {
                calls.set(calls.get() + 1);
                Ok::<i32, ()>(1)
            })
            .unwrap_err();
        assert_eq!(err, RefreshError::UnknownKey("zzz"));
        assert_eq!(calls.get(), 0);
        assert_eq!(t.get(&"a"), None);
    }

    #[test]
    fn diff_skips_unknown_keys() {
        let mut t = tracker();
        let changes = t.diff(Refresh::keys(["zzz", "b"]), false, constant(2));
        assert_eq!(changes.keys().copied().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn failing_derive_keeps_earlier_results() {
        let mut t = tracker();
        let err = t
            .refresh(Refresh::All, false, |key, _, _| {
                if *key == "b" { Err("boom") } else { Ok(7) }
            })
            .unwrap_err();
        assert_eq!(
            err,
            RefreshError::Derive {
                key: "b",
                source: "boom"
            }
        );
        assert_eq!(t.get(&"a"), Some(&7));
        assert_eq!(t.get(&"b"), None);
        assert_eq!(t.get(&"c"), None);
    }

    #[test]
    fn seeded_value_counts_as_previous() {
        let mut t = tracker();
        assert!(t.seed(&"a", 3));
        assert!(!t.seed(&"zzz", 3));
        let changes = t.diff(Refresh::All, true, constant(3));
        assert_eq!(changes.keys().copied().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn custom_equality() {
        let mut t: ChangeTracker<&str, f64> = ChangeTracker::new();
        t.track("x", Box::new(|a: &f64, b: &f64| (a - b).abs() < 0.5));
        t.diff(Refresh::All, true, |_, _, _| 1.0);
        let changes = t.diff(Refresh::All, false, |_, _, _| 1.2);
        assert!(changes.is_empty());
        assert_eq!(t.get(&"x"), Some(&1.0));
        let changes = t.diff(Refresh::All, false, |_, _, _| 2.0);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn duplicate_track_is_refused() {
        let mut t = tracker();
        assert!(!t.track_eq("a"));
        assert_eq!(t.len(), 3);
    }
}
