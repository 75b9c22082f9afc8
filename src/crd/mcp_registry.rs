//! MCPRegistry CRD
//!
//! Declares a source of deployable MCP server definitions together with the
//! sync state the lifecycle state machine maintains for it.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

// =============================================================================
// MCPRegistry CRD
// =============================================================================

/// MCPRegistry points at a config-object or git source of MCP server
/// definitions and tracks the outcome of synchronizing it.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "toolhive.stacklok.dev",
    version = "v1alpha1",
    kind = "MCPRegistry",
    plural = "mcpregistries",
    shortname = "mcpreg",
    status = "MCPRegistryStatus",
    printcolumn = r#"{"name": "Display Name", "type": "string", "jsonPath": ".spec.displayName"}"#,
    printcolumn = r#"{"name": "Source", "type": "string", "jsonPath": ".spec.source.type"}"#,
    printcolumn = r#"{"name": "Servers", "type": "integer", "jsonPath": ".status.serverCount"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Last Sync", "type": "date", "jsonPath": ".status.lastSyncTime"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MCPRegistrySpec {
    /// Human readable label (1-100 characters)
    pub display_name: String,

    /// Where the server definitions come from
    pub source: RegistrySource,

    /// Automatic sync schedule; absent means manual-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,

    /// Include/exclude filter applied to the synced server list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RegistryFilter>,

    /// Only servers declared in this registry may run in its namespace
    #[serde(default)]
    pub enforce_servers: bool,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Source descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum RegistrySource {
    /// A key inside an in-cluster ConfigMap
    #[serde(rename = "configRef")]
    ConfigRef {
        #[serde(rename = "objectName")]
        object_name: String,
        key: String,
    },

    /// A file inside a remote git repository
    #[serde(rename = "git")]
    Git {
        repository: String,
        #[serde(default = "default_branch")]
        branch: String,
        path: String,
    },
}

impl RegistrySource {
    /// Short type tag, as it appears on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            RegistrySource::ConfigRef { .. } => "configRef",
            RegistrySource::Git { .. } => "git",
        }
    }
}

/// Sync schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    /// Interval between syncs, e.g. "30m" or "1h30m"
    pub interval: String,
}

impl SyncPolicy {
    /// Parsed interval
    pub fn interval_duration(&self) -> Result<Duration> {
        parse_sync_interval(&self.interval)
    }
}

/// Declarative include/exclude filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFilter {
    /// Glob patterns matched against server names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<IncludeExclude>,

    /// Tags matched exactly against server tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<IncludeExclude>,
}

/// Include and exclude lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncludeExclude {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

// =============================================================================
// Status
// =============================================================================

/// Status of the MCPRegistry, written only by the lifecycle state machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MCPRegistryStatus {
    /// Current phase
    #[serde(default)]
    pub phase: RegistryPhase,

    /// Completion time of the last successful sync
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,

    /// Start time of the last sync attempt
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_attempt_time: Option<DateTime<Utc>>,

    /// SHA-256 of the last successfully synced server list
    #[serde(default)]
    pub last_sync_hash: Option<String>,

    /// Admitted servers in the last successful sync
    #[serde(default)]
    pub server_count: u32,

    /// Human readable cause of the last failure
    #[serde(default)]
    pub message: Option<String>,

    /// Live serving endpoint, discovered by the provisioning process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    /// Last sync-trigger token consumed
    #[serde(default)]
    pub last_sync_trigger: Option<String>,
}

/// Registry lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RegistryPhase {
    #[default]
    Pending,
    Syncing,
    Ready,
    Error,
}

impl std::fmt::Display for RegistryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryPhase::Pending => write!(f, "Pending"),
            RegistryPhase::Syncing => write!(f, "Syncing"),
            RegistryPhase::Ready => write!(f, "Ready"),
            RegistryPhase::Error => write!(f, "Error"),
        }
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_branch() -> String {
    "main".to_string()
}

// =============================================================================
// Implementations
// =============================================================================

impl MCPRegistry {
    /// Get the registry name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Get the registry namespace
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Current phase, Pending when no status was written yet
    pub fn phase(&self) -> RegistryPhase {
        self.status
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    /// Check if a sync is in flight
    pub fn is_syncing(&self) -> bool {
        self.phase() == RegistryPhase::Syncing
    }

    /// Value of the sync-trigger annotation, if any
    pub fn sync_trigger(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(super::labels::SYNC_TRIGGER_ANNOTATION))
            .map(String::as_str)
    }
}

impl MCPRegistrySpec {
    /// Validate a spec before it is written
    pub fn validate(&self, name: &str) -> Result<()> {
        validate_resource_name(name)?;

        let display_len = self.display_name.chars().count();
        if display_len == 0 || display_len > 100 {
            return Err(Error::InvalidArgument(format!(
                "displayName must be 1-100 characters, got {}",
                display_len
            )));
        }

        match &self.source {
            RegistrySource::ConfigRef { object_name, key } => {
                if object_name.trim().is_empty() || key.trim().is_empty() {
                    return Err(Error::InvalidArgument(
                        "configRef source requires objectName and key".into(),
                    ));
                }
            }
            RegistrySource::Git {
                repository,
                branch,
                path,
            } => {
                validate_git_repository(repository)?;
                if branch.trim().is_empty() {
                    return Err(Error::InvalidArgument("git branch must not be empty".into()));
                }
                if path.trim().is_empty() {
                    return Err(Error::InvalidArgument("git path must not be empty".into()));
                }
            }
        }

        if let Some(policy) = &self.sync_policy {
            policy.interval_duration()?;
        }

        if let Some(filter) = &self.filter {
            crate::registry::filter::validate_filter(filter)?;
        }

        Ok(())
    }
}

/// Validate a Kubernetes resource name (DNS-1123 label)
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 {
        return Err(Error::InvalidArgument(format!(
            "name '{}' must be 1-63 characters",
            name
        )));
    }

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    if !name.chars().next().map(alnum).unwrap_or(false)
        || !name.chars().last().map(alnum).unwrap_or(false)
    {
        return Err(Error::InvalidArgument(format!(
            "name '{}' must start and end with a lowercase letter or digit",
            name
        )));
    }

    if !name.chars().all(|c| alnum(c) || c == '-') {
        return Err(Error::InvalidArgument(format!(
            "name '{}' may only contain lowercase letters, digits and '-'",
            name
        )));
    }

    Ok(())
}

/// Hosts a git source may point at
pub const GIT_HOSTS: [&str; 3] = ["github.com", "gitlab.com", "bitbucket.org"];

fn validate_git_repository(repository: &str) -> Result<()> {
    let rest = repository.strip_prefix("https://").ok_or_else(|| {
        Error::InvalidArgument(format!("git repository '{}' must use https", repository))
    })?;

    let host = rest.split('/').next().unwrap_or_default();
    if !GIT_HOSTS.contains(&host) {
        return Err(Error::InvalidArgument(format!(
            "git repository host '{}' is not one of {}",
            host,
            GIT_HOSTS.join(", ")
        )));
    }

    if !rest.ends_with(".git") || rest.split('/').filter(|s| !s.is_empty()).count() < 3 {
        return Err(Error::InvalidArgument(format!(
            "git repository '{}' must look like https://{}/<owner>/<repo>.git",
            repository, host
        )));
    }

    Ok(())
}

/// Parse a sync interval matching `(\d+[smhd])+`
pub fn parse_sync_interval(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty interval".into()));
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let multiplier = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => {
                return Err(Error::DurationParse(format!(
                    "unknown unit '{}' in '{}'",
                    c, s
                )))
            }
        };

        if digits.is_empty() {
            return Err(Error::DurationParse(format!(
                "unit '{}' without a number in '{}'",
                c, s
            )));
        }

        let value: u64 = digits
            .parse()
            .map_err(|_| Error::DurationParse(format!("number too large in '{}'", s)))?;
        total_secs = value
            .checked_mul(multiplier)
            .and_then(|v| total_secs.checked_add(v))
            .ok_or_else(|| Error::DurationParse(format!("interval '{}' overflows", s)))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(Error::DurationParse(format!(
            "trailing number without unit in '{}'",
            s
        )));
    }

    if total_secs == 0 {
        return Err(Error::DurationParse(format!("interval '{}' is zero", s)));
    }

    Ok(Duration::from_secs(total_secs))
}
