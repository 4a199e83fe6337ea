//! Builder/subsystem configuration context.
//!
//! `SubsystemCtx` is the runtime analogue of `R2eConfig` in a web-framework
//! sense, but it carries arbitrary JSON rather than `application.yaml`
//! key/value pairs: facets read whatever shape of configuration their
//! factory expects out of it. Deep merge is the only contract this crate
//! promises (§4.3): nested objects recurse, everything else is last-write-wins.

use serde_json::{Map, Value};

/// A resolved or overlay configuration blob threaded through hook factories.
///
/// Cloning a `SubsystemCtx` is O(size of the JSON tree) — plans cache the
/// resolved ctx rather than recomputing the merge on every access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsystemCtx {
    root: Map<String, Value>,
}

impl SubsystemCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self { root: map },
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self { root: map }
            }
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn as_value(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Set a single top-level key, replacing whatever was there.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.root.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Deep-merge `patch` into `self`: nested objects recurse key-by-key,
    /// scalars (and arrays) in `patch` overwrite whatever was at that key.
    pub fn merge(&mut self, patch: &SubsystemCtx) {
        merge_maps(&mut self.root, &patch.root);
    }

    /// Produce a new ctx that is `self` overlaid with `patch`, without
    /// mutating either input.
    pub fn merged_with(&self, patch: &SubsystemCtx) -> SubsystemCtx {
        let mut out = self.clone();
        out.merge(patch);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn merge_maps(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, patch_value) in patch {
        match (base.get_mut(key), patch_value) {
            (Some(Value::Object(base_obj)), Value::Object(patch_obj)) => {
                merge_maps(base_obj, patch_obj);
            }
            _ => {
                base.insert(key.clone(), patch_value.clone());
            }
        }
    }
}

impl From<Value> for SubsystemCtx {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_leaf_is_last_write_wins() {
        let mut base = SubsystemCtx::from_value(json!({"a": 1, "b": 2}));
        let patch = SubsystemCtx::from_value(json!({"b": 3}));
        base.merge(&patch);
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(base.get("b"), Some(&json!(3)));
    }

    #[test]
    fn nested_objects_recurse() {
        let mut base = SubsystemCtx::from_value(json!({
            "queue": {"capacity": 10, "name": "default"}
        }));
        let patch = SubsystemCtx::from_value(json!({
            "queue": {"capacity": 20}
        }));
        base.merge(&patch);
        assert_eq!(
            base.get("queue"),
            Some(&json!({"capacity": 20, "name": "default"}))
        );
    }

    #[test]
    fn merged_with_does_not_mutate_inputs() {
        let base = SubsystemCtx::from_value(json!({"a": 1}));
        let patch = SubsystemCtx::from_value(json!({"a": 2}));
        let merged = base.merged_with(&patch);
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("a"), Some(&json!(2)));
    }
}
