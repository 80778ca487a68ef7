//! Flattening of nested report values into `key, value` rows
//!
//! Objects join keys with `.`; sequences append a positional `[i]`.

use crate::error::Result;
use crate::system::CapabilitySnapshot;
use serde_json::Value;

/// Key prefix used for accelerator entries in flat output
pub const ACCELERATOR_KEY: &str = "accelerator";

/// Flatten any JSON value into ordered `(key, value)` rows
pub fn flatten_value(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_value(&key, v, rows);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.iter().enumerate() {
                flatten_value(&format!("{}[{}]", prefix, i), v, rows);
            }
        }
        leaf => rows.push((prefix.to_string(), render_leaf(leaf))),
    }
}

/// Flatten a snapshot: one row per scalar field, accelerators as `accelerator[i].field`
pub fn flatten_snapshot(snapshot: &CapabilitySnapshot) -> Result<Vec<(String, String)>> {
    let mut value = serde_json::to_value(snapshot)?;
    let accelerators = value
        .as_object_mut()
        .and_then(|obj| obj.shift_remove("accelerators"))
        .unwrap_or(Value::Array(Vec::new()));

    let mut rows = Vec::new();
    flatten_value("", &value, &mut rows);
    if let Value::Array(items) = accelerators {
        for (i, item) in items.iter().enumerate() {
            flatten_value(&format!("{}[{}]", ACCELERATOR_KEY, i), item, &mut rows);
        }
    }
    Ok(rows)
}

fn render_leaf(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::AcceleratorDescriptor;
    use std::collections::HashSet;

    fn snapshot_with(accelerators: Vec<AcceleratorDescriptor>) -> CapabilitySnapshot {
        CapabilitySnapshot {
            timestamp: "2024-01-01T00:00:00.000000Z".into(),
            os: "linux".into(),
            os_release: Some("6.1.0".into()),
            os_version: None,
            arch: "x86_64".into(),
            runtime: "wsbench 0.1.0".into(),
            compute_backends: "cpu".into(),
            cuda_available: true,
            mps_available: false,
            cuda_version: Some("12.2".into()),
            cpu_logical: Some(16),
            cpu_physical: Some(8),
            ram_total_gb: Some(62.5),
            ram_available_gb: None,
            accelerators,
        }
    }

    fn gpu(name: &str) -> AcceleratorDescriptor {
        AcceleratorDescriptor {
            name: name.into(),
            memory_gb: Some(24.0),
            capability: Some("8.9".into()),
        }
    }

    #[test]
    fn test_two_accelerators_have_distinct_keys() {
        let rows = flatten_snapshot(&snapshot_with(vec![gpu("A"), gpu("B")])).unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();

        let unique: HashSet<&str> = keys.iter().copied().collect();
        assert_eq!(unique.len(), keys.len());

        for i in 0..2 {
            for field in ["name", "memory_gb", "capability"] {
                let key = format!("accelerator[{}].{}", i, field);
                assert!(unique.contains(key.as_str()), "missing {}", key);
            }
        }
        let name_b = rows.iter().find(|(k, _)| k == "accelerator[1].name").unwrap();
        assert_eq!(name_b.1, "B");
    }

    #[test]
    fn test_scalar_rendering_and_order() {
        let rows = flatten_snapshot(&snapshot_with(Vec::new())).unwrap();
        assert_eq!(rows[0].0, "timestamp");
        let get = |key: &str| rows.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        assert_eq!(get("cuda_available").as_deref(), Some("true"));
        assert_eq!(get("ram_available_gb").as_deref(), Some(""));
        assert_eq!(get("cpu_logical").as_deref(), Some("16"));
        assert!(rows.iter().all(|(k, _)| !k.starts_with("accelerator")));
    }

    #[test]
    fn test_flatten_nested_generic() {
        let value = serde_json::json!({"a": {"b": 1, "c": [true, {"d": null}]}, "e": []});
        let mut rows = Vec::new();
        flatten_value("", &value, &mut rows);
        assert_eq!(
            rows,
            vec![
                ("a.b".to_string(), "1".to_string()),
                ("a.c[0]".to_string(), "true".to_string()),
                ("a.c[1].d".to_string(), String::new()),
                ("e".to_string(), "[]".to_string()),
            ]
        );
    }
}
