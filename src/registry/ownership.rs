//! Ownership Labels
//!
//! An MCPServer belongs to a registry when it carries all three ownership
//! labels with non-empty values. The label triple is the only link between
//! the two resources; the store has no foreign keys.
//!
//! Values written by this operator must also be valid label values: at most
//! 63 characters of `[A-Za-z0-9._-]`, starting and ending alphanumeric.

use crate::crd::{
    MCPServer, REGISTRY_NAMESPACE_LABEL, REGISTRY_NAME_LABEL, SERVER_NAME_LABEL,
};
use crate::domain::ports::ResourceKey;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest value the API server accepts for a label
const MAX_LABEL_VALUE_LEN: usize = 63;

/// The ownership label triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    pub registry_name: String,
    pub registry_namespace: String,
    pub server_name_in_registry: String,
}

impl Ownership {
    /// Build an ownership triple, rejecting empty fields and values that
    /// cannot be stored as labels
    pub fn new(
        registry_name: impl Into<String>,
        registry_namespace: impl Into<String>,
        server_name_in_registry: impl Into<String>,
    ) -> Result<Self> {
        let ownership = Self {
            registry_name: registry_name.into().trim().to_string(),
            registry_namespace: registry_namespace.into().trim().to_string(),
            server_name_in_registry: server_name_in_registry.into().trim().to_string(),
        };

        let missing: Vec<&str> = ownership
            .fields()
            .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect();

        if !missing.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        for (field, value) in ownership.fields() {
            if let Some(reason) = label_value_problem(value) {
                return Err(Error::InvalidArgument(format!(
                    "{} '{}' is not a valid label value: {}",
                    field, value, reason
                )));
            }
        }

        Ok(ownership)
    }

    /// Read the triple from a label map; `None` unless all three are present
    /// and non-empty
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Option<Self> {
        let get = |key: &str| {
            labels
                .get(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let ownership = Self {
            registry_name: get(REGISTRY_NAME_LABEL),
            registry_namespace: get(REGISTRY_NAMESPACE_LABEL),
            server_name_in_registry: get(SERVER_NAME_LABEL),
        };
        ownership.is_complete().then_some(ownership)
    }

    /// Read the triple from a server's labels
    pub fn of_server(server: &MCPServer) -> Option<Self> {
        server.metadata.labels.as_ref().and_then(Self::from_labels)
    }

    /// Check that every field is non-empty
    pub fn is_complete(&self) -> bool {
        !self.registry_name.is_empty()
            && !self.registry_namespace.is_empty()
            && !self.server_name_in_registry.is_empty()
    }

    /// Key of the owning registry
    pub fn registry_key(&self) -> ResourceKey {
        ResourceKey::new(&self.registry_namespace, &self.registry_name)
    }

    /// Check if this triple points at the given registry
    pub fn is_owned_by(&self, registry: &ResourceKey) -> bool {
        self.registry_name == registry.name && self.registry_namespace == registry.namespace
    }

    /// The three labels, ready to merge into metadata
    pub fn to_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (REGISTRY_NAME_LABEL.to_string(), self.registry_name.clone()),
            (
                REGISTRY_NAMESPACE_LABEL.to_string(),
                self.registry_namespace.clone(),
            ),
            (
                SERVER_NAME_LABEL.to_string(),
                self.server_name_in_registry.clone(),
            ),
        ])
    }

    fn fields(&self) -> [(&'static str, &String); 3] {
        [
            ("registryName", &self.registry_name),
            ("registryNamespace", &self.registry_namespace),
            ("serverNameInRegistry", &self.server_name_in_registry),
        ]
    }
}

/// Why `value` cannot be a label value, if it cannot
fn label_value_problem(value: &str) -> Option<&'static str> {
    if value.len() > MAX_LABEL_VALUE_LEN {
        return Some("longer than 63 characters");
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Some("only alphanumerics, '-', '_' and '.' are allowed");
    }
    let alnum_edge = |c: Option<char>| c.map_or(false, |c| c.is_ascii_alphanumeric());
    if !alnum_edge(value.chars().next()) || !alnum_edge(value.chars().last()) {
        return Some("must start and end with an alphanumeric character");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_complete_triple() {
        let map = labels(&[
            (REGISTRY_NAME_LABEL, "upstream"),
            (REGISTRY_NAMESPACE_LABEL, "toolhive-system"),
            (SERVER_NAME_LABEL, "fetch"),
            ("app", "fetch"),
        ]);
        let ownership = Ownership::from_labels(&map).unwrap();
        assert!(ownership.is_complete());
        assert_eq!(ownership.registry_key(), ResourceKey::new("toolhive-system", "upstream"));
        assert_eq!(
            Ownership::new("upstream", "toolhive-system", "fetch").unwrap(),
            ownership
        );
    }

    #[test]
    fn test_partial_or_empty_is_none() {
        let partial = labels(&[
            (REGISTRY_NAME_LABEL, "upstream"),
            (REGISTRY_NAMESPACE_LABEL, "toolhive-system"),
        ]);
        assert!(Ownership::from_labels(&partial).is_none());

        let blank = labels(&[
            (REGISTRY_NAME_LABEL, "upstream"),
            (REGISTRY_NAMESPACE_LABEL, "toolhive-system"),
            (SERVER_NAME_LABEL, "  "),
        ]);
        assert!(Ownership::from_labels(&blank).is_none());
    }

    #[test]
    fn test_new_rejects_missing_fields() {
        let err = Ownership::new("upstream", "", " ").unwrap_err();
        match err {
            Error::InvalidArgument(msg) => {
                assert!(msg.contains("registryNamespace"));
                assert!(msg.contains("serverNameInRegistry"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_new_rejects_invalid_label_values() {
        for name in [
            "io.github/fetch",
            "fetch server",
            "-fetch",
            "fetch.",
            "a".repeat(64).as_str(),
        ] {
            let err = Ownership::new("upstream", "default", name).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument, "{}", name);
            assert!(err.to_string().contains("serverNameInRegistry"));
        }

        let ok = Ownership::new("upstream", "default", "io.github.stacklok_fetch-2").unwrap();
        assert_eq!(ok.server_name_in_registry, "io.github.stacklok_fetch-2");
        assert!(Ownership::new("upstream", "default", "a".repeat(63)).is_ok());
    }

    #[test]
    fn test_to_labels_round_trip() {
        let ownership = Ownership::new("upstream", "default", "fetch").unwrap();
        assert_eq!(Ownership::from_labels(&ownership.to_labels()), Some(ownership));
    }
}
