//! Shared YAML lookup helpers for the executor and oracles

use serde_yaml::{Mapping, Value};

/// Follow a key path through nested mappings.
pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.as_mapping()?.get(Value::String((*key).to_string()))?;
    }
    Some(current)
}

/// String at a key path, if present
pub(crate) fn lookup_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path).and_then(Value::as_str)
}

/// Whether this document is a Deployment manifest
pub(crate) fn is_deployment(manifest: &Value) -> bool {
    lookup_str(manifest, &["kind"]) == Some("Deployment")
}

/// Pod template label value, if present
pub(crate) fn pod_template_label<'a>(manifest: &'a Value, key: &str) -> Option<&'a str> {
    lookup_str(manifest, &["spec", "template", "metadata", "labels", key])
}

/// Containers of the pod template; empty when absent
pub(crate) fn containers(manifest: &Value) -> &[Value] {
    lookup(manifest, &["spec", "template", "spec", "containers"])
        .and_then(Value::as_sequence)
        .map_or(&[], Vec::as_slice)
}

/// Container name, defaulting to "unknown" for nameless containers
pub(crate) fn container_name(container: &Value) -> &str {
    lookup_str(container, &["name"]).unwrap_or("unknown")
}

/// Get or create a nested mapping under `key`, replacing non-mapping values.
pub(crate) fn ensure_map<'a>(map: &'a mut Mapping, key: &str) -> &'a mut Mapping {
    let slot = map
        .entry(Value::String(key.to_string()))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot.as_mapping_mut() {
        Some(m) => m,
        None => unreachable!("slot was just made a mapping"),
    }
}

/// Insert a string value under `key`
pub(crate) fn set_str(map: &mut Mapping, key: &str, value: &str) {
    map.insert(
        Value::String(key.to_string()),
        Value::String(value.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_nested_mappings() {
        let doc: Value = serde_yaml::from_str("a:\n  b:\n    c: 3\n").unwrap();
        assert_eq!(lookup(&doc, &["a", "b", "c"]).and_then(Value::as_i64), Some(3));
        assert!(lookup(&doc, &["a", "x"]).is_none());
    }

    #[test]
    fn ensure_map_replaces_scalar_values() {
        let mut map = Mapping::new();
        map.insert(Value::String("labels".into()), Value::String("oops".into()));
        ensure_map(&mut map, "labels").insert(Value::String("k".into()), Value::String("v".into()));
        let doc = Value::Mapping(map);
        assert_eq!(lookup_str(&doc, &["labels", "k"]), Some("v"));
    }
}
