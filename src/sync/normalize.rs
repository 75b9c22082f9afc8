//! Response Normalization
//!
//! Registry endpoints disagree on payload shape. Lists may arrive as a bare
//! array, under `servers` (array or map keyed by name), or under `tools`.
//! Everything is normalized into `Vec<RegistryServerEntry>` here.

use crate::domain::ports::RegistryServerEntry;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Parse a response body as JSON, falling back to YAML for registry documents
pub fn parse_body(body: &str, endpoint: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str::<Value>(body)
            .ok()
            .filter(|v| v.is_array() || v.is_object())
            .ok_or_else(|| Error::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: format!("body is neither JSON nor YAML: {}", json_err),
            }),
    }
}

/// Normalize a list payload
pub fn normalize_list(value: Value, endpoint: &str) -> Result<Vec<RegistryServerEntry>> {
    let raw: Vec<(Option<String>, Value)> = match value {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(mut map) => match map.remove("servers") {
            Some(Value::Array(items)) => items.into_iter().map(|v| (None, v)).collect(),
            Some(Value::Object(by_name)) => by_name.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Some(Value::Null) | None => match map.remove("tools") {
                Some(Value::Array(items)) => items.into_iter().map(|v| (None, v)).collect(),
                _ => {
                    return Err(Error::InvalidResponse {
                        endpoint: endpoint.to_string(),
                        reason: "expected an array or a 'servers'/'tools' key".into(),
                    })
                }
            },
            Some(_) => {
                return Err(Error::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    reason: "'servers' is neither an array nor a map".into(),
                })
            }
        },
        _ => {
            return Err(Error::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "expected a JSON array or object".into(),
            })
        }
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());

    for (key, item) in raw {
        let Some(entry) = to_entry(item, key.as_deref(), endpoint) else {
            continue;
        };
        if !seen.insert(entry.name.clone()) {
            warn!("Duplicate server '{}' from {}; keeping the first", entry.name, endpoint);
            continue;
        }
        entries.push(entry);
    }

    Ok(entries)
}

/// Normalize a single-server payload, bare or wrapped as `{"server": {...}}`
pub fn normalize_single(value: Value, name: &str, endpoint: &str) -> Result<RegistryServerEntry> {
    let item = match value {
        Value::Object(mut map) => match map.remove("server") {
            Some(inner @ Value::Object(_)) => inner,
            _ if map.contains_key("name") || map.contains_key("image") => Value::Object(map),
            _ => {
                return Err(Error::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    reason: "expected a server object".into(),
                })
            }
        },
        _ => {
            return Err(Error::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "expected a JSON object".into(),
            })
        }
    };

    to_entry(item, Some(name), endpoint).ok_or_else(|| Error::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: format!("server '{}' could not be decoded", name),
    })
}

/// Decode one entry; `fallback_name` fills a missing name
fn to_entry(item: Value, fallback_name: Option<&str>, endpoint: &str) -> Option<RegistryServerEntry> {
    let mut entry: RegistryServerEntry = match serde_json::from_value(item) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Skipping undecodable server entry from {}: {}", endpoint, e);
            return None;
        }
    };

    if entry.name.trim().is_empty() {
        match fallback_name {
            Some(name) => entry.name = name.to_string(),
            None => {
                warn!("Skipping unnamed server entry from {}", endpoint);
                return None;
            }
        }
    }

    if entry.tools_count.is_none() {
        entry.tools_count = Some(entry.capabilities.len() as u32);
    }

    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EP: &str = "https://registry.example.com/api";

    fn names(entries: &[RegistryServerEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_bare_array() {
        let entries = normalize_list(json!([{"name": "fetch"}, {"name": "time"}]), EP).unwrap();
        assert_eq!(names(&entries), vec!["fetch", "time"]);
    }

    #[test]
    fn test_servers_array_and_tools_key() {
        let entries = normalize_list(json!({"servers": [{"name": "fetch"}]}), EP).unwrap();
        assert_eq!(names(&entries), vec!["fetch"]);

        let entries = normalize_list(json!({"tools": [{"name": "github"}]}), EP).unwrap();
        assert_eq!(names(&entries), vec!["github"]);
    }

    #[test]
    fn test_servers_map_uses_keys_as_names() {
        let entries = normalize_list(
            json!({
                "version": "1.0.0",
                "servers": {
                    "fetch": {"image": "ghcr.io/stackloklabs/gofetch/server:latest", "tools": ["fetch"]},
                    "osv": {"image": "ghcr.io/stackloklabs/osv-mcp/server:latest"}
                }
            }),
            EP,
        )
        .unwrap();

        assert_eq!(names(&entries), vec!["fetch", "osv"]);
        assert_eq!(entries[0].tools_count, Some(1));
        assert_eq!(entries[1].tools_count, Some(0));
    }

    #[test]
    fn test_unrecognized_shape() {
        assert!(matches!(
            normalize_list(json!({"items": []}), EP),
            Err(Error::InvalidResponse { .. })
        ));
        assert!(matches!(
            normalize_list(json!("servers"), EP),
            Err(Error::InvalidResponse { .. })
        ));
        assert!(matches!(
            normalize_list(json!({"servers": 3}), EP),
            Err(Error::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let entries = normalize_list(
            json!([{"name": "fetch", "version": "1"}, {"name": "fetch", "version": "2"}]),
            EP,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version.as_deref(), Some("1"));
    }

    #[test]
    fn test_unnamed_and_invalid_entries_skipped() {
        let entries = normalize_list(json!([{"image": "x"}, 42, {"name": "ok"}]), EP).unwrap();
        assert_eq!(names(&entries), vec!["ok"]);
    }

    #[test]
    fn test_single_shapes() {
        let entry = normalize_single(json!({"server": {"image": "x"}}), "fetch", EP).unwrap();
        assert_eq!(entry.name, "fetch");

        let entry = normalize_single(json!({"name": "fetch", "image": "x"}), "fetch", EP).unwrap();
        assert_eq!(entry.image, "x");

        assert!(normalize_single(json!({"other": 1}), "fetch", EP).is_err());
        assert!(normalize_single(json!([]), "fetch", EP).is_err());
    }

    #[test]
    fn test_parse_body_yaml_fallback() {
        let value = parse_body("servers:\n  - name: fetch\n", EP).unwrap();
        assert_eq!(names(&normalize_list(value, EP).unwrap()), vec!["fetch"]);

        assert!(parse_body("<html>oops</html>", EP).is_err());
    }
}
