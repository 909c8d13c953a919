#![forbid(unsafe_code)]

//! Structural (deep) merging of option trees.
//!
//! Objects merge key-by-key; every other value replaces the target value
//! wholesale. Updating one nested leaf therefore never clobbers its siblings.

use serde_json::Value;

use crate::Map;

/// Merge `source` into `target` in place.
pub fn assign_deep(target: &mut Map, source: &Map) {
    for (key, value) in source {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (target.get_mut(key), value)
        {
            assign_deep(existing, incoming);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Return `base` with `overlay` merged over it.
#[must_use]
pub fn merged(base: &Map, overlay: &Map) -> Map {
    let mut out = base.clone();
    assign_deep(&mut out, overlay);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn nested_siblings_survive() {
        let mut target = map(json!({ "nested": { "p": 1, "q": 2 }, "flat": true }));
        assign_deep(&mut target, &map(json!({ "nested": { "p": 9 } })));
        assert_eq!(
            Value::Object(target),
            json!({ "nested": { "p": 9, "q": 2 }, "flat": true })
        );
    }

    #[test]
    fn non_objects_replace() {
        let mut target = map(json!({ "list": [1, 2, 3], "obj": { "a": 1 } }));
        assign_deep(&mut target, &map(json!({ "list": [4], "obj": 7 })));
        assert_eq!(Value::Object(target), json!({ "list": [4], "obj": 7 }));
    }

    #[test]
    fn object_replaces_scalar() {
        let mut target = map(json!({ "a": null }));
        assign_deep(&mut target, &map(json!({ "a": { "b": 1 } })));
        assert_eq!(Value::Object(target), json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn merged_leaves_base_untouched() {
        let base = map(json!({ "a": { "b": 1 } }));
        let out = merged(&base, &map(json!({ "a": { "c": 2 } })));
        assert_eq!(Value::Object(out), json!({ "a": { "b": 1, "c": 2 } }));
        assert_eq!(Value::Object(base), json!({ "a": { "b": 1 } }));
    }
}
