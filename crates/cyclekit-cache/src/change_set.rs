#![forbid(unsafe_code)]

//! Per-cycle change reports and refresh requests.

/// Which keys a refresh should re-derive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Refresh<K> {
    /// Re-derive nothing.
    #[default]
    Nothing,
    /// Re-derive every tracked key.
    All,
    /// Re-derive exactly these keys.
    Keys(Vec<K>),
}

impl<K> Refresh<K> {
    /// Request for a list of keys.
    #[must_use]
    pub fn keys(keys: impl IntoIterator<Item = K>) -> Self {
        Self::Keys(keys.into_iter().collect())
    }

    #[must_use]
    pub fn is_nothing(&self) -> bool {
        match self {
            Self::Nothing => true,
            Self::All => false,
            Self::Keys(keys) => keys.is_empty(),
        }
    }
}

impl<K> From<Option<Vec<K>>> for Refresh<K> {
    /// `None` means every key.
    fn from(keys: Option<Vec<K>>) -> Self {
        keys.map_or(Self::All, Self::Keys)
    }
}

/// One changed key: its new value and the value it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<K, V> {
    pub key: K,
    pub value: V,
    /// `None` when the key had never been derived.
    pub previous: Option<V>,
}

/// Keys that changed during one refresh, in derivation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<K, V> {
    changes: Vec<Change<K, V>>,
    forced: bool,
}

impl<K, V> Default for ChangeSet<K, V> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
            forced: false,
        }
    }
}

impl<K: PartialEq, V> ChangeSet<K, V> {
    #[must_use]
    pub fn new(forced: bool) -> Self {
        Self {
            changes: Vec::new(),
            forced,
        }
    }

    /// Record a change. A later change for the same key replaces the value
    /// but keeps the original `previous`.
    pub fn push(&mut self, change: Change<K, V>) {
        if let Some(existing) = self.changes.iter_mut().find(|c| c.key == change.key) {
            existing.value = change.value;
        } else {
            self.changes.push(change);
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&Change<K, V>> {
        self.changes.iter().find(|c| &c.key == key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

impl<K, V> ChangeSet<K, V> {
    /// Whether any key changed.
    #[must_use]
    pub fn anything_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether the refresh that produced this set was forced.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.changes.iter().map(|c| &c.key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change<K, V>> {
        self.changes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<'a, K, V> IntoIterator for &'a ChangeSet<K, V> {
    type Item = &'a Change<K, V>;
    type IntoIter = std::slice::Iter<'a, Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<K, V> IntoIterator for ChangeSet<K, V> {
    type Item = Change<K, V>;
    type IntoIter = std::vec::IntoIter<Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
