//! Endpoint Fetcher
//!
//! Fetches server listings from a resolved endpoint. Ordinary URLs are
//! requested directly; in-cluster service addresses
//! (`service.namespace.svc.<cluster-domain>`) are relayed through the API
//! server's service proxy subresource using the operator's own credentials.

use crate::domain::ports::{RegistryServerEntry, ResolvedEndpoint, ServerListFetcher};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::Client;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use super::normalize::{normalize_list, normalize_single, parse_body};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the endpoint fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-request timeout, applied to both modes
    pub request_timeout: Duration,
    /// Cluster DNS domain used to recognize in-cluster services
    pub cluster_domain: String,
    /// User agent sent on direct requests
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            cluster_domain: "cluster.local".to_string(),
            user_agent: format!("mcp-registry-operator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// =============================================================================
// Endpoint Mode
// =============================================================================

/// An in-cluster service address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalService {
    pub scheme: String,
    pub service: String,
    pub namespace: String,
    pub port: Option<u16>,
    /// Path and query of the requested URL
    pub path_and_query: String,
}

impl InternalService {
    /// API-server path relaying the request to this service
    pub fn proxy_path(&self) -> String {
        let target = match (self.scheme.as_str(), self.port) {
            ("https", Some(port)) => format!("https:{}:{}", self.service, port),
            ("https", None) => format!("https:{}:", self.service),
            (_, Some(port)) => format!("{}:{}", self.service, port),
            (_, None) => self.service.clone(),
        };
        format!(
            "/api/v1/namespaces/{}/services/{}/proxy{}",
            self.namespace, target, self.path_and_query
        )
    }
}

/// How a URL is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointMode {
    /// Direct HTTP(S) request
    External(Url),
    /// Relayed through the API server's service proxy
    ClusterInternal(InternalService),
}

impl EndpointMode {
    /// Pick the mode for a URL
    pub fn detect(endpoint: &str, cluster_domain: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("scheme must be http or https"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host"))?
            .trim_end_matches('.')
            .to_ascii_lowercase();

        let svc_suffix = format!(".svc.{}", cluster_domain.trim_matches('.'));
        let prefix = host
            .strip_suffix(&svc_suffix)
            .or_else(|| host.strip_suffix(".svc"));

        let Some(prefix) = prefix else {
            return Ok(EndpointMode::External(url));
        };

        let labels: Vec<&str> = prefix.split('.').collect();
        match labels.as_slice() {
            [service, namespace] if !service.is_empty() && !namespace.is_empty() => {
                Ok(EndpointMode::ClusterInternal(InternalService {
                    scheme: url.scheme().to_string(),
                    service: service.to_string(),
                    namespace: namespace.to_string(),
                    port: url.port(),
                    path_and_query: path_and_query(&url),
                }))
            }
            _ => Err(invalid(
                "in-cluster address must be <service>.<namespace>.svc[.<cluster-domain>]",
            )),
        }
    }

    pub fn is_cluster_internal(&self) -> bool {
        matches!(self, EndpointMode::ClusterInternal(_))
    }
}

/// Whether a 404 means "absent" or a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotFound {
    IsNone,
    IsError,
}

// =============================================================================
// Endpoint Fetcher
// =============================================================================

/// Fetches server lists over HTTP or through the cluster API proxy
pub struct EndpointFetcher {
    config: FetcherConfig,
    http: reqwest::Client,
    /// Absent in standalone mode; in-cluster endpoints then fail
    kube: Option<Client>,
}

impl EndpointFetcher {
    /// Create a new fetcher
    pub fn new(config: FetcherConfig, kube: Option<Client>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, http, kube })
    }

    /// Fetch `url` and parse the body; `Ok(None)` only for a tolerated 404
    async fn fetch_value(&self, url: &str, not_found: NotFound) -> Result<Option<serde_json::Value>> {
        let mode = EndpointMode::detect(url, &self.config.cluster_domain)?;
        let timeout = self.config.request_timeout;

        let fetch = async {
            match &mode {
                EndpointMode::External(url) => self.fetch_direct(url, not_found).await,
                EndpointMode::ClusterInternal(service) => {
                    self.fetch_proxied(url, service, not_found).await
                }
            }
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(Some(body))) => parse_body(&body, url).map(Some),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::timeout(format!("fetch {}", url), timeout)),
        }
    }

    /// Direct request
    async fn fetch_direct(&self, url: &Url, not_found: NotFound) -> Result<Option<String>> {
        debug!("Fetching {} directly", url);

        let response = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::FetchFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && not_found == NotFound::IsNone {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Some(response.text().await?))
    }

    /// Request relayed through the API server's service proxy
    async fn fetch_proxied(
        &self,
        url: &str,
        service: &InternalService,
        not_found: NotFound,
    ) -> Result<Option<String>> {
        let client = self.kube.as_ref().ok_or_else(|| Error::FetchFailed {
            endpoint: url.to_string(),
            reason: "in-cluster endpoint requires a Kubernetes client".into(),
        })?;

        let path = service.proxy_path();
        debug!("Fetching {} via API proxy {}", url, path);

        let request = hyper::Request::get(path)
            .header("Accept", "application/json")
            .body(Vec::new())
            .map_err(|e| Error::Internal(format!("building proxy request: {}", e)))?;

        match client.request_text(request).await {
            Ok(text) => Ok(Some(text)),
            Err(kube::Error::Api(resp)) if resp.code == 404 && not_found == NotFound::IsNone => {
                Ok(None)
            }
            Err(kube::Error::Api(resp)) => Err(Error::UpstreamStatus {
                endpoint: url.to_string(),
                status: resp.code,
            }),
            Err(e) => Err(Error::FetchFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Path and query of a URL, without a bare trailing slash
fn path_and_query(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    match url.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    }
}

/// Logical list URL for an endpoint
pub fn list_url(endpoint: &ResolvedEndpoint) -> String {
    match endpoint {
        ResolvedEndpoint::Api(base) => format!("{}/servers", base.trim_end_matches('/')),
        ResolvedEndpoint::Document(url) => url.clone(),
    }
}

/// Logical item URL for an API endpoint
pub fn item_url(base: &str, name: &str) -> String {
    format!(
        "{}/servers/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(name)
    )
}

#[async_trait]
impl ServerListFetcher for EndpointFetcher {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn list_servers(&self, endpoint: &ResolvedEndpoint) -> Result<Vec<RegistryServerEntry>> {
        let url = list_url(endpoint);
        let value = self
            .fetch_value(&url, NotFound::IsError)
            .await?
            .ok_or_else(|| Error::UpstreamStatus {
                endpoint: url.clone(),
                status: 404,
            })?;
        normalize_list(value, &url)
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn get_server(
        &self,
        endpoint: &ResolvedEndpoint,
        name: &str,
    ) -> Result<Option<RegistryServerEntry>> {
        match endpoint {
            ResolvedEndpoint::Api(base) => {
                let url = item_url(base, name);
                match self.fetch_value(&url, NotFound::IsNone).await? {
                    Some(value) => normalize_single(value, name, &url).map(Some),
                    None => Ok(None),
                }
            }
            ResolvedEndpoint::Document(_) => Ok(self
                .list_servers(endpoint)
                .await?
                .into_iter()
                .find(|e| e.name == name)),
        }
    }

    fn fetcher_name(&self) -> &str {
        "endpoint"
    }
}
