#![forbid(unsafe_code)]

//! Options template resolution.
//!
//! An [`OptionsDecl`] pairs every option key with a default value and a
//! [`Rule`]. [`OptionsDecl::resolve`] splits it into the immutable
//! [`OptionsTemplate`] (rules only) and the default values, both keeping the
//! declaration's nesting.
//!
//! # Failure Modes
//!
//! Resolution is the only place where a template can be rejected. Every
//! error is a configuration error: it names the dotted path of the
//! offending key and is not retried.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::Map;
use crate::rule::{Rule, Verdict};

/// Configuration error raised while resolving an [`OptionsDecl`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("option `{path}` declares neither a rule nor a usable default")]
    Unconstrained { path: String },

    #[error("option `{path}` has a rule that rejects null but no default")]
    MissingDefault { path: String },

    #[error("default for option `{path}` is invalid: {reason}")]
    InvalidDefault { path: String, reason: String },

    #[error("option `{path}` is declared more than once")]
    DuplicateKey { path: String },

    #[error("empty option key under `{path}`")]
    EmptyKey { path: String },

    #[error("rule for option `{path}` is malformed: {reason}")]
    InvalidRule { path: String, reason: String },
}

/// Declaration of one option key.
#[derive(Debug, Clone)]
pub enum OptionDecl {
    Leaf {
        default: Option<Value>,
        rule: Option<Rule>,
    },
    Group(OptionsDecl),
}

/// Declarative options: defaults and rules, possibly nested.
#[derive(Debug, Clone, Default)]
pub struct OptionsDecl {
    entries: Vec<(String, OptionDecl)>,
}

impl OptionsDecl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option with a default and an explicit rule.
    #[must_use]
    pub fn option(self, key: impl Into<String>, default: impl Into<Value>, rule: Rule) -> Self {
        self.declare(
            key,
            OptionDecl::Leaf {
                default: Some(default.into()),
                rule: Some(rule),
            },
        )
    }

    /// Declare an option whose rule is inferred from the default's kind.
    #[must_use]
    pub fn value(self, key: impl Into<String>, default: impl Into<Value>) -> Self {
        self.declare(
            key,
            OptionDecl::Leaf {
                default: Some(default.into()),
                rule: None,
            },
        )
    }

    /// Declare an option with a rule only; its default is `null`.
    #[must_use]
    pub fn nullable(self, key: impl Into<String>, rule: Rule) -> Self {
        self.declare(
            key,
            OptionDecl::Leaf {
                default: None,
                rule: Some(rule),
            },
        )
    }

    /// Declare a nested group of options.
    #[must_use]
    pub fn group(self, key: impl Into<String>, group: OptionsDecl) -> Self {
        self.declare(key, OptionDecl::Group(group))
    }

    /// Declare an arbitrary entry.
    #[must_use]
    pub fn declare(mut self, key: impl Into<String>, decl: OptionDecl) -> Self {
        self.entries.push((key.into(), decl));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split the declaration into template and defaults.
    pub fn resolve(self) -> Result<Resolved, TemplateError> {
        let (template, defaults) = resolve_group(self, "")?;
        Ok(Resolved { template, defaults })
    }
}

/// Output of [`OptionsDecl::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub template: OptionsTemplate,
    pub defaults: Map,
}

/// Rule or nested group for one key of a resolved template.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    Leaf(Rule),
    Group(OptionsTemplate),
}

/// Immutable per-key validation schema.
#[derive(Debug, Clone, Default)]
pub struct OptionsTemplate {
    nodes: BTreeMap<String, TemplateNode>,
}

impl OptionsTemplate {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TemplateNode> {
        self.nodes.get(key)
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `map` has exactly this template's key set, recursively.
    #[must_use]
    pub fn matches_shape(&self, map: &Map) -> bool {
        map.len() == self.nodes.len()
            && self.nodes.iter().all(|(key, node)| match (node, map.get(key)) {
                (TemplateNode::Leaf(_), Some(_)) => true,
                (TemplateNode::Group(group), Some(Value::Object(inner))) => {
                    group.matches_shape(inner)
                }
                _ => false,
            })
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn resolve_group(decl: OptionsDecl, prefix: &str) -> Result<(OptionsTemplate, Map), TemplateError> {
    let mut nodes = BTreeMap::new();
    let mut defaults = Map::new();

    for (key, entry) in decl.entries {
        let path = join_path(prefix, &key);
        if key.is_empty() {
            return Err(TemplateError::EmptyKey {
                path: prefix.to_string(),
            });
        }
        if nodes.contains_key(&key) {
            return Err(TemplateError::DuplicateKey { path });
        }

        let (node, default) = match entry {
            OptionDecl::Group(group) => {
                let (template, values) = resolve_group(group, &path)?;
                (TemplateNode::Group(template), Value::Object(values))
            }
            OptionDecl::Leaf { default, rule } => {
                let (rule, default) = resolve_leaf(default, rule, &path)?;
                (TemplateNode::Leaf(rule), default)
            }
        };
        nodes.insert(key.clone(), node);
        defaults.insert(key, default);
    }

    Ok((OptionsTemplate { nodes }, defaults))
}

fn resolve_leaf(
    default: Option<Value>,
    rule: Option<Rule>,
    path: &str,
) -> Result<(Rule, Value), TemplateError> {
    if let Some(reason) = rule.as_ref().and_then(Rule::defect) {
        return Err(TemplateError::InvalidRule {
            path: path.to_string(),
            reason,
        });
    }
    match (default, rule) {
        (None, None) | (Some(Value::Null), None) => Err(TemplateError::Unconstrained {
            path: path.to_string(),
        }),
        (Some(default), None) => Ok((Rule::inferred_from(&default), default)),
        (None, Some(rule)) => {
            if rule.admits_null() {
                Ok((rule, Value::Null))
            } else {
                Err(TemplateError::MissingDefault {
                    path: path.to_string(),
                })
            }
        }
        (Some(default), Some(rule)) => match rule.check(&default, &default) {
            Verdict::Accept => Ok((rule, default)),
            Verdict::Coerce(_) => Err(TemplateError::InvalidDefault {
                path: path.to_string(),
                reason: "default needs coercion".to_string(),
            }),
            Verdict::Reject(reason) => Err(TemplateError::InvalidDefault {
                path: path.to_string(),
                reason,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ValueKinds;
    use serde_json::json;

    fn sample() -> OptionsDecl {
        OptionsDecl::new()
            .option("paddingAbsolute", false, Rule::kinds(ValueKinds::BOOLEAN))
            .value("resizeDebounce", 30)
            .group(
                "overflow",
                OptionsDecl::new()
                    .option("x", "scroll", Rule::one_of(["hidden", "scroll", "visible"]))
                    .option("y", "scroll", Rule::one_of(["hidden", "scroll", "visible"])),
            )
            .nullable("target", Rule::kinds(ValueKinds::STRING | ValueKinds::NULL))
    }

    #[test]
    fn resolve_splits_defaults_and_rules() {
        let resolved = sample().resolve().expect("valid declaration");
        assert_eq!(
            Value::Object(resolved.defaults.clone()),
            json!({
                "paddingAbsolute": false,
                "resizeDebounce": 30,
                "overflow": { "x": "scroll", "y": "scroll" },
                "target": null,
            })
        );
        assert_eq!(resolved.template.len(), 4);
        assert!(matches!(
            resolved.template.get("overflow"),
            Some(TemplateNode::Group(group)) if group.len() == 2
        ));
        assert!(resolved.template.matches_shape(&resolved.defaults));
    }

    #[test]
    fn inferred_rule_follows_default_kind() {
        let resolved = sample().resolve().expect("valid declaration");
        let Some(TemplateNode::Leaf(rule)) = resolved.template.get("resizeDebounce") else {
            panic!("leaf expected");
        };
        assert_eq!(rule.check(&json!(5), &json!(30)), Verdict::Accept);
        assert!(matches!(
            rule.check(&json!("5"), &json!(30)),
            Verdict::Reject(_)
        ));
    }

    #[test]
    fn unconstrained_leaf_is_rejected() {
        let err = OptionsDecl::new()
            .group(
                "a",
                OptionsDecl::new().declare(
                    "b",
                    OptionDecl::Leaf {
                        default: None,
                        rule: None,
                    },
                ),
            )
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unconstrained {
                path: "a.b".to_string()
            }
        );
    }

    #[test]
    fn null_default_without_rule_is_unconstrained() {
        let err = OptionsDecl::new().value("x", Value::Null).resolve().unwrap_err();
        assert!(matches!(err, TemplateError::Unconstrained { .. }));
    }

    #[test]
    fn rule_without_default_must_admit_null() {
        let err = OptionsDecl::new()
            .nullable("x", Rule::kinds(ValueKinds::NUMBER))
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingDefault {
                path: "x".to_string()
            }
        );
    }

    #[test]
    fn invalid_default_is_rejected() {
        let err = OptionsDecl::new()
            .option("mode", "diagonal", Rule::one_of(["x", "y"]))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidDefault { path, .. } if path == "mode"));

        let err = OptionsDecl::new()
            .option("ratio", 5, Rule::range(0.0, 1.0))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidDefault { .. }));
    }

    #[test]
    fn malformed_range_is_a_template_error() {
        let err = OptionsDecl::new()
            .option("x", 3, Rule::range(5.0, 1.0))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { ref path, .. } if path == "x"));

        let err = OptionsDecl::new()
            .group(
                "g",
                OptionsDecl::new().option(
                    "x",
                    false,
                    Rule::any_of([Rule::kinds(ValueKinds::BOOLEAN), Rule::range(5.0, 1.0)]),
                ),
            )
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { ref path, .. } if path == "g.x"));

        let err = OptionsDecl::new()
            .nullable("n", Rule::any_of([Rule::kinds(ValueKinds::NULL), Rule::range(0.0, f64::NAN)]))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));
    }

    #[test]
    fn duplicate_and_empty_keys_are_rejected() {
        let err = OptionsDecl::new()
            .value("a", 1)
            .value("a", 2)
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateKey {
                path: "a".to_string()
            }
        );

        let err = OptionsDecl::new()
            .group("g", OptionsDecl::new().value("", 1))
            .resolve()
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::EmptyKey {
                path: "g".to_string()
            }
        );
    }

    #[test]
    fn matches_shape_detects_missing_and_extra_keys() {
        let resolved = sample().resolve().expect("valid declaration");
        let mut extra = resolved.defaults.clone();
        extra.insert("bogus".into(), json!(1));
        assert!(!resolved.template.matches_shape(&extra));

        let mut missing = resolved.defaults.clone();
        if let Some(Value::Object(overflow)) = missing.get_mut("overflow") {
            overflow.remove("y");
        }
        assert!(!resolved.template.matches_shape(&missing));
    }
}
