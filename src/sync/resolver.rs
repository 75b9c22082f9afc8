//! Source Resolver
//!
//! Decides where a registry's server list is fetched from. A live
//! `status.apiEndpoint` is authoritative; otherwise a git source resolves to
//! the hosting provider's raw-content URL for the registry file.

use crate::crd::{MCPRegistry, RegistrySource};
use crate::domain::ports::{ResolvedEndpoint, ResourceKey};
use crate::error::{Error, Result};

/// Resolve the endpoint for a registry
pub fn resolve(registry: &MCPRegistry) -> Result<ResolvedEndpoint> {
    let key = ResourceKey::of_registry(registry);

    if let Some(endpoint) = registry
        .status
        .as_ref()
        .and_then(|s| s.api_endpoint.as_deref())
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        return Ok(ResolvedEndpoint::Api(endpoint.trim_end_matches('/').to_string()));
    }

    match &registry.spec.source {
        RegistrySource::Git {
            repository,
            branch,
            path,
        } => raw_content_url(repository, branch, path)
            .map(ResolvedEndpoint::Document)
            .ok_or_else(|| Error::NoEndpoint {
                registry: key.to_string(),
                reason: format!("cannot derive a raw-content URL from '{}'", repository),
            }),
        RegistrySource::ConfigRef { object_name, key: data_key } => Err(Error::NoEndpoint {
            registry: key.to_string(),
            reason: format!(
                "configRef source {}/{} has no live API endpoint yet",
                object_name, data_key
            ),
        }),
    }
}

/// Raw-content URL of `path` on `branch` for a github/gitlab/bitbucket repo
pub fn raw_content_url(repository: &str, branch: &str, path: &str) -> Option<String> {
    let rest = repository.strip_prefix("https://")?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let mut parts = rest.splitn(2, '/');
    let host = parts.next()?;
    let repo_path = parts.next()?.trim_matches('/');
    if repo_path.is_empty() || !repo_path.contains('/') {
        return None;
    }

    let branch = urlencoding::encode(branch.trim());
    let path = path.trim().trim_start_matches('/');

    match host {
        "github.com" => Some(format!(
            "https://raw.githubusercontent.com/{}/{}/{}",
            repo_path, branch, path
        )),
        "gitlab.com" => Some(format!("https://gitlab.com/{}/-/raw/{}/{}", repo_path, branch, path)),
        "bitbucket.org" => Some(format!(
            "https://bitbucket.org/{}/raw/{}/{}",
            repo_path, branch, path
        )),
        _ => None,
    }
}
