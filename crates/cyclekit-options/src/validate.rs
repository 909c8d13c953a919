#![forbid(unsafe_code)]

//! Validation of incoming partial options against a template.
//!
//! Two entry points, one per situation:
//!
//! - [`initialize`]: construction time. Every supplied key is validated and
//!   the survivors are deep-merged over the defaults, producing a full
//!   option tree. Nothing is compared.
//! - [`revalidate`]: any later update. Every supplied key is validated and
//!   kept only if its sanitized value differs from the previous one.
//!
//! A key that fails its rule is dropped and recorded as a [`Rejection`];
//! its siblings are unaffected.

use serde_json::Value;
use thiserror::Error;

use crate::Map;
use crate::merge::{assign_deep, merged};
use crate::rule::{ValueKinds, Verdict};
use crate::template::{OptionsTemplate, TemplateNode, join_path};

/// Why a candidate key was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("unknown option")]
    UnknownKey,

    #[error("{0}")]
    Invalid(String),

    #[error("expected an object, got {found}")]
    NotAnObject { found: String },
}

/// A dropped candidate key, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub path: String,
    pub reason: RejectReason,
}

impl Rejection {
    #[must_use]
    pub fn new(path: impl Into<String>, reason: RejectReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    /// Rejection for a whole candidate that is not an object.
    #[must_use]
    pub fn not_an_object(path: impl Into<String>, found: &Value) -> Self {
        Self::new(
            path,
            RejectReason::NotAnObject {
                found: ValueKinds::of(found).describe(),
            },
        )
    }
}

/// Result of [`initialize`].
#[derive(Debug, Clone)]
pub struct Initialized {
    /// Full option tree: defaults with the valid candidate keys merged in.
    pub options: Map,
    pub rejected: Vec<Rejection>,
}

/// Result of [`revalidate`].
#[derive(Debug, Clone, Default)]
pub struct Revalidated {
    /// Sanitized keys whose value differs from the previous tree.
    pub delta: Map,
    /// Top-level keys present in `delta`.
    pub changed_keys: Vec<String>,
    pub rejected: Vec<Rejection>,
}

impl Revalidated {
    /// Whether nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Validate `candidate` and merge it over `defaults`.
#[must_use]
pub fn initialize(candidate: &Map, template: &OptionsTemplate, defaults: &Map) -> Initialized {
    let mut rejected = Vec::new();
    let validated = sanitize(candidate, template, defaults, false, "", &mut rejected);
    let mut options = defaults.clone();
    assign_deep(&mut options, &validated);
    Initialized { options, rejected }
}

/// Validate `candidate` and keep only keys that differ from `previous`.
#[must_use]
pub fn revalidate(candidate: &Map, template: &OptionsTemplate, previous: &Map) -> Revalidated {
    let mut rejected = Vec::new();
    let delta = sanitize(candidate, template, previous, true, "", &mut rejected);
    let changed_keys = delta.keys().cloned().collect();
    Revalidated {
        delta,
        changed_keys,
        rejected,
    }
}

fn sanitize(
    candidate: &Map,
    template: &OptionsTemplate,
    current: &Map,
    dedupe: bool,
    prefix: &str,
    rejected: &mut Vec<Rejection>,
) -> Map {
    let mut out = Map::new();

    for (key, value) in candidate {
        let path = join_path(prefix, key);
        match template.get(key) {
            None => rejected.push(Rejection::new(path, RejectReason::UnknownKey)),
            Some(TemplateNode::Group(group)) => {
                let Value::Object(inner) = value else {
                    rejected.push(Rejection::not_an_object(path, value));
                    continue;
                };
                let empty = Map::new();
                let current_inner = current
                    .get(key)
                    .and_then(Value::as_object)
                    .unwrap_or(&empty);
                let nested = sanitize(inner, group, current_inner, dedupe, &path, rejected);
                if !nested.is_empty() {
                    out.insert(key.clone(), Value::Object(nested));
                }
            }
            Some(TemplateNode::Leaf(rule)) => {
                let current_value = current.get(key).unwrap_or(&Value::Null);
                // Object-valued leaves merge over what they replace; the rule
                // sees the merged object.
                let candidate = match (current_value, value) {
                    (Value::Object(existing), Value::Object(incoming)) => {
                        Value::Object(merged(existing, incoming))
                    }
                    _ => value.clone(),
                };
                let accepted = match rule.check(&candidate, current_value) {
                    Verdict::Accept => candidate,
                    Verdict::Coerce(coerced) => coerced,
                    Verdict::Reject(reason) => {
                        rejected.push(Rejection::new(path, RejectReason::Invalid(reason)));
                        continue;
                    }
                };
                if dedupe && same_value(&accepted, current_value) {
                    continue;
                }
                out.insert(key.clone(), accepted);
            }
        }
    }

    out
}

/// Structural equality where numbers compare by value, so `800.0` equals
/// `800`.
#[must_use]
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || ((x.is_f64() || y.is_f64()) && x.as_f64() == y.as_f64())
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}
