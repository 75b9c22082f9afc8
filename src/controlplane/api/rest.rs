//! REST API Handlers
//!
//! Implements the admin endpoints for registry management, sync requests,
//! server listings and attachment of orphaned servers.

use crate::controlplane::RegistryManager;
use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, ServerPhase};
use crate::domain::ports::{RegistryServerEntry, ResourceKey};
use crate::error::Error;
use crate::registry::{AttachRequest, Page, ServerQuery, ServerSummary};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Registry creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistryRequest {
    pub name: String,
    #[serde(flatten)]
    pub spec: MCPRegistrySpec,
}

/// Registry view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryResponse {
    pub name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub spec: MCPRegistrySpec,
    pub status: MCPRegistryStatus,
}

impl From<MCPRegistry> for RegistryResponse {
    fn from(registry: MCPRegistry) -> Self {
        let key = ResourceKey::of_registry(&registry);
        Self {
            name: key.name,
            namespace: key.namespace,
            spec: registry.spec,
            status: registry.status.unwrap_or_default(),
        }
    }
}

/// Registry list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryListResponse {
    pub items: Vec<RegistryResponse>,
    pub total: usize,
}

/// Accepted sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAcceptedResponse {
    pub sync_id: String,
    pub registry: String,
    pub token: String,
}

/// Server summaries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerListResponse {
    pub items: Vec<ServerSummary>,
    pub total: usize,
}

/// Result of a connect request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub server: ServerSummary,
    pub changed: bool,
}

/// Query of the sync endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub force: bool,
}

/// Query of the servers endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerListParams {
    pub tags: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Query of the deployed-servers endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployedParams {
    pub status: Option<String>,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

/// Operator error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }

        let body = ApiErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Unwrap a JSON body; bodies of the wrong shape are invalid arguments
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError(Error::InvalidArgument(rejection.body_text())))
}

/// Unwrap query parameters the same way
fn query_params<T>(params: std::result::Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError(Error::InvalidArgument(rejection.body_text())))
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    manager: Arc<RegistryManager>,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(manager: Arc<RegistryManager>) -> Self {
        Self { manager }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            manager: self.manager,
        };

        Router::new()
            // Registry endpoints
            .route(
                "/v1/namespaces/:namespace/registries",
                get(list_registries).post(create_registry),
            )
            .route(
                "/v1/namespaces/:namespace/registries/:name",
                get(get_registry).put(update_registry).delete(delete_registry),
            )
            .route(
                "/v1/namespaces/:namespace/registries/:name/sync",
                post(sync_registry),
            )
            // Available server endpoints
            .route(
                "/v1/namespaces/:namespace/registries/:name/servers",
                get(list_servers),
            )
            .route(
                "/v1/namespaces/:namespace/registries/:name/servers/:server",
                get(get_server),
            )
            // Running server endpoints
            .route(
                "/v1/namespaces/:namespace/registries/:name/deployed-servers",
                get(deployed_servers),
            )
            .route(
                "/v1/namespaces/:namespace/orphaned-servers",
                get(orphaned_servers),
            )
            .route(
                "/v1/namespaces/:namespace/orphaned-servers/:server/connect",
                post(connect_server),
            )
            // Health endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<RegistryManager>,
}

// =============================================================================
// Registry Handlers
// =============================================================================

async fn list_registries(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<RegistryListResponse>> {
    let items: Vec<RegistryResponse> = state
        .manager
        .list_registries(Some(&namespace))
        .await?
        .into_iter()
        .map(RegistryResponse::from)
        .collect();

    Ok(Json(RegistryListResponse {
        total: items.len(),
        items,
    }))
}

async fn create_registry(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    payload: std::result::Result<Json<CreateRegistryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegistryResponse>)> {
    let request = json_body(payload)?;
    info!("Creating registry {}/{}", namespace, request.name);

    let mut registry = MCPRegistry::new(&request.name, request.spec);
    registry.metadata.namespace = Some(namespace);

    let created = state.manager.create_registry(registry).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn get_registry(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<RegistryResponse>> {
    let key = ResourceKey::new(namespace, name);
    Ok(Json(state.manager.get_registry(&key).await?.into()))
}

async fn update_registry(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    payload: std::result::Result<Json<MCPRegistrySpec>, JsonRejection>,
) -> ApiResult<Json<RegistryResponse>> {
    let spec = json_body(payload)?;
    let key = ResourceKey::new(namespace, name);
    Ok(Json(state.manager.update_registry(&key, spec).await?.into()))
}

async fn delete_registry(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let key = ResourceKey::new(namespace, name);
    state.manager.delete_registry(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_registry(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    params: std::result::Result<Query<SyncParams>, QueryRejection>,
) -> ApiResult<(StatusCode, Json<SyncAcceptedResponse>)> {
    let params = query_params(params)?;
    let key = ResourceKey::new(namespace, name);

    let ticket = if params.force {
        state.manager.force_sync(&key).await?
    } else {
        state.manager.trigger_sync(&key).await?
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse {
            sync_id: ticket.sync_id.to_string(),
            registry: ticket.registry.to_string(),
            token: ticket.token.clone(),
        }),
    ))
}

// =============================================================================
// Server Handlers
// =============================================================================

async fn list_servers(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    params: std::result::Result<Query<ServerListParams>, QueryRejection>,
) -> ApiResult<Json<Page<RegistryServerEntry>>> {
    let params = query_params(params)?;
    let key = ResourceKey::new(namespace, name);
    let query = ServerQuery::new(
        ServerQuery::parse_tags(params.tags.as_deref()),
        params.offset,
        params.limit,
    );
    Ok(Json(state.manager.list_servers(&key, &query).await?))
}

async fn get_server(
    State(state): State<AppState>,
    Path((namespace, name, server)): Path<(String, String, String)>,
) -> ApiResult<Json<RegistryServerEntry>> {
    let key = ResourceKey::new(namespace, name);
    Ok(Json(state.manager.get_server(&key, &server).await?))
}

async fn deployed_servers(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    params: std::result::Result<Query<DeployedParams>, QueryRejection>,
) -> ApiResult<Json<ServerListResponse>> {
    let params = query_params(params)?;
    let key = ResourceKey::new(namespace, name);
    let phase = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ServerPhase>)
        .transpose()?;

    let items = state.manager.deployed_servers(&key, phase).await?;
    Ok(Json(ServerListResponse {
        total: items.len(),
        items,
    }))
}

async fn orphaned_servers(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<ServerListResponse>> {
    let items = state.manager.orphaned_servers(&namespace).await?;
    Ok(Json(ServerListResponse {
        total: items.len(),
        items,
    }))
}

async fn connect_server(
    State(state): State<AppState>,
    Path((namespace, server)): Path<(String, String)>,
    payload: std::result::Result<Json<AttachRequest>, JsonRejection>,
) -> ApiResult<Json<ConnectResponse>> {
    let request = json_body(payload)?;
    let key = ResourceKey::new(namespace, server);
    let outcome = state.manager.attach_server(&key, &request).await?;

    Ok(Json(ConnectResponse {
        server: ServerSummary::from_server(&outcome.server, Some(outcome.ownership)),
        changed: outcome.changed,
    }))
}

// =============================================================================
// Health Handlers
// =============================================================================

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.list_registries(Some("default")).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}
