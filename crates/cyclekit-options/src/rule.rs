#![forbid(unsafe_code)]

//! Validation rules for single option values.
//!
//! A [`Rule`] inspects a candidate value (and the value currently stored for
//! the same key) and returns a [`Verdict`]: accept it as-is, replace it with
//! a coerced equivalent, or reject it with a reason.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde_json::Value;

bitflags! {
    /// Set of JSON value kinds an option accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValueKinds: u8 {
        const NULL = 1 << 0;
        const BOOLEAN = 1 << 1;
        const NUMBER = 1 << 2;
        const STRING = 1 << 3;
        const ARRAY = 1 << 4;
        const OBJECT = 1 << 5;
    }
}

impl ValueKinds {
    /// The single kind of `value`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::NULL,
            Value::Bool(_) => Self::BOOLEAN,
            Value::Number(_) => Self::NUMBER,
            Value::String(_) => Self::STRING,
            Value::Array(_) => Self::ARRAY,
            Value::Object(_) => Self::OBJECT,
        }
    }

    /// Whether `value` is of one of the kinds in this set.
    #[must_use]
    pub fn admits(self, value: &Value) -> bool {
        self.contains(Self::of(value))
    }

    /// Lowercase kind names, joined with `|`.
    #[must_use]
    pub fn describe(self) -> String {
        const NAMES: [(ValueKinds, &str); 6] = [
            (ValueKinds::NULL, "null"),
            (ValueKinds::BOOLEAN, "boolean"),
            (ValueKinds::NUMBER, "number"),
            (ValueKinds::STRING, "string"),
            (ValueKinds::ARRAY, "array"),
            (ValueKinds::OBJECT, "object"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(kind, _)| self.contains(*kind))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            "nothing".to_string()
        } else {
            names.join("|")
        }
    }
}

/// Outcome of checking one candidate value against a [`Rule`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The candidate is valid as given.
    Accept,
    /// The candidate was invalid but has a valid equivalent.
    Coerce(Value),
    /// The candidate is unusable.
    Reject(String),
}

/// Normalizer signature: `(candidate, current) -> verdict`.
pub type NormalizeFn = dyn Fn(&Value, &Value) -> Verdict + Send + Sync;

/// Validator/normalizer for one option key.
#[derive(Clone)]
pub enum Rule {
    /// Value must be one of the given kinds.
    Kinds(ValueKinds),
    /// Value must be one of the given strings.
    OneOf(Vec<String>),
    /// Value must be a number; out-of-range numbers are clamped.
    Range { min: f64, max: f64 },
    /// Caller-supplied normalizer.
    Custom(Arc<NormalizeFn>),
    /// First accepting rule wins.
    AnyOf(Vec<Rule>),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::AnyOf(rules) => f.debug_tuple("AnyOf").field(rules).finish(),
        }
    }
}

impl Rule {
    /// Accept values of the given kinds.
    #[must_use]
    pub const fn kinds(kinds: ValueKinds) -> Self {
        Self::Kinds(kinds)
    }

    /// Accept one of the given strings.
    #[must_use]
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Accept numbers, clamping into `min..=max`.
    #[must_use]
    pub fn range(min: f64, max: f64) -> Self {
        Self::Range { min, max }
    }

    /// Wrap a normalizer closure.
    #[must_use]
    pub fn custom(f: impl Fn(&Value, &Value) -> Verdict + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Try each rule in order.
    #[must_use]
    pub fn any_of(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::AnyOf(rules.into_iter().collect())
    }

    /// Rule inferred from a default value: accept the default's own kind.
    #[must_use]
    pub fn inferred_from(default: &Value) -> Self {
        Self::Kinds(ValueKinds::of(default))
    }

    /// Check `candidate` given the value currently held for the key.
    #[must_use]
    pub fn check(&self, candidate: &Value, current: &Value) -> Verdict {
        match self {
            Self::Kinds(kinds) => {
                if kinds.admits(candidate) {
                    Verdict::Accept
                } else {
                    Verdict::Reject(format!(
                        "expected {}, got {}",
                        kinds.describe(),
                        ValueKinds::of(candidate).describe()
                    ))
                }
            }
            Self::OneOf(allowed) => match candidate.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => Verdict::Accept,
                _ => Verdict::Reject(format!("expected one of [{}]", allowed.join(", "))),
            },
            Self::Range { min, max } if !ordered(*min, *max) => {
                Verdict::Reject(format!("malformed range {min}..={max}"))
            }
            Self::Range { min, max } => match candidate.as_f64() {
                Some(n) if n >= *min && n <= *max => Verdict::Accept,
                Some(n) => Verdict::Coerce(clamped_number(n.clamp(*min, *max))),
                None => Verdict::Reject(format!("expected number in {min}..={max}")),
            },
            Self::Custom(normalize) => normalize(candidate, current),
            Self::AnyOf(rules) => {
                let mut reasons = Vec::with_capacity(rules.len());
                for rule in rules {
                    match rule.check(candidate, current) {
                        Verdict::Reject(reason) => reasons.push(reason),
                        verdict => return verdict,
                    }
                }
                Verdict::Reject(reasons.join("; "))
            }
        }
    }

    /// Why this rule can never be applied, if it is malformed. `AnyOf`
    /// members are checked recursively.
    #[must_use]
    pub fn defect(&self) -> Option<String> {
        match self {
            Self::Range { min, max } if !ordered(*min, *max) => Some(format!(
                "range bounds {min}..={max} are not ordered numbers"
            )),
            Self::OneOf(allowed) if allowed.is_empty() => Some("empty `one_of` list".to_string()),
            Self::AnyOf(rules) => rules.iter().find_map(Rule::defect),
            _ => None,
        }
    }

    /// Whether `null` passes this rule (used for rule-only declarations).
    #[must_use]
    pub fn admits_null(&self) -> bool {
        !matches!(self.check(&Value::Null, &Value::Null), Verdict::Reject(_))
    }
}

// False for inverted bounds and for NaN on either side.
fn ordered(min: f64, max: f64) -> bool {
    min <= max
}

// Keep integral results integral so `1.0` does not replace `1` in diffs.
fn clamped_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
