#![forbid(unsafe_code)]

//! The live, fully-populated option tree.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Map;
use crate::merge::assign_deep;
use crate::template::Resolved;
use crate::validate::{Rejection, Revalidated, initialize};

/// Current option values.
///
/// Only produced by [`Options::initialize`] and only changed through
/// [`Options::apply`] with a [`Revalidated`] delta, so the key set always
/// equals the template's.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Options(Map);

impl Options {
    /// Build the initial tree from defaults and a candidate partial.
    #[must_use]
    pub fn initialize(candidate: &Map, resolved: &Resolved) -> (Self, Vec<Rejection>) {
        let out = initialize(candidate, &resolved.template, &resolved.defaults);
        (Self(out.options), out.rejected)
    }

    /// Merge a revalidated delta into the tree.
    pub fn apply(&mut self, delta: &Revalidated) {
        assign_deep(&mut self.0, &delta.delta);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a nested value by dotted path (`"overflow.x"`).
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        parts.try_fold(self.0.get(first)?, |value, part| value.as_object()?.get(part))
    }

    #[must_use]
    pub fn as_map(&self) -> &Map {
        &self.0
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Typed view of the whole tree.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
