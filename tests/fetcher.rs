//! Endpoint fetcher tests against a local HTTP registry

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mcp_registry_operator::domain::ports::{ResolvedEndpoint, ServerListFetcher};
use mcp_registry_operator::error::{Error, ErrorKind};
use mcp_registry_operator::sync::{EndpointFetcher, FetcherConfig};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

async fn spawn_registry() -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/servers",
            get(|| async {
                Json(json!({
                    "servers": [
                        {"name": "fetch", "image": "ghcr.io/stackloklabs/gofetch/server:latest", "tools": ["fetch"]},
                        {"name": "time", "image": "mcp/time:latest"}
                    ]
                }))
            }),
        )
        .route(
            "/api/servers/fetch",
            get(|| async {
                Json(json!({"server": {"image": "ghcr.io/stackloklabs/gofetch/server:latest"}}))
            }),
        )
        .route(
            "/tools/servers",
            get(|| async { Json(json!({"tools": [{"name": "github"}]})) }),
        )
        .route(
            "/bare/servers",
            get(|| async { Json(json!([{"name": "osv"}])) }),
        )
        .route(
            "/shape/servers",
            get(|| async { Json(json!({"items": [{"name": "osv"}]})) }),
        )
        .route(
            "/broken/servers",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow/servers",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        )
        .route(
            "/registry.json",
            get(|| async {
                Json(json!({
                    "version": "1.0.0",
                    "servers": {
                        "fetch": {"image": "ghcr.io/stackloklabs/gofetch/server:latest"},
                        "osv": {"image": "ghcr.io/stackloklabs/osv-mcp/server:latest"}
                    }
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher(timeout: Duration) -> EndpointFetcher {
    EndpointFetcher::new(
        FetcherConfig {
            request_timeout: timeout,
            ..Default::default()
        },
        None,
    )
    .unwrap()
}

fn api(addr: SocketAddr, prefix: &str) -> ResolvedEndpoint {
    ResolvedEndpoint::Api(format!("http://{}/{}", addr, prefix))
}

#[tokio::test]
async fn lists_servers_in_every_shape() {
    let addr = spawn_registry().await;
    let fetcher = fetcher(Duration::from_secs(5));

    let entries = fetcher.list_servers(&api(addr, "api")).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].capabilities, vec!["fetch".to_string()]);
    assert_eq!(entries[0].tools_count, Some(1));

    let entries = fetcher.list_servers(&api(addr, "tools")).await.unwrap();
    assert_eq!(entries[0].name, "github");

    let entries = fetcher.list_servers(&api(addr, "bare")).await.unwrap();
    assert_eq!(entries[0].name, "osv");

    let err = fetcher.list_servers(&api(addr, "shape")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}

#[tokio::test]
async fn item_404_is_none_but_list_404_is_error() {
    let addr = spawn_registry().await;
    let fetcher = fetcher(Duration::from_secs(5));

    let entry = fetcher.get_server(&api(addr, "api"), "fetch").await.unwrap().unwrap();
    assert_eq!(entry.name, "fetch");

    assert!(fetcher.get_server(&api(addr, "api"), "missing").await.unwrap().is_none());

    let err = fetcher.list_servers(&api(addr, "nowhere")).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 404, .. }));
    assert_eq!(err.kind(), ErrorKind::FetchFailure);
}

#[tokio::test]
async fn non_success_and_timeouts_are_fetch_failures() {
    let addr = spawn_registry().await;
    let fetcher = fetcher(Duration::from_millis(300));

    let err = fetcher.list_servers(&api(addr, "broken")).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 500, .. }));

    let err = fetcher.list_servers(&api(addr, "slow")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchFailure);
}

#[tokio::test]
async fn document_endpoints_list_and_select() {
    let addr = spawn_registry().await;
    let fetcher = fetcher(Duration::from_secs(5));
    let document = ResolvedEndpoint::Document(format!("http://{}/registry.json", addr));

    let entries = fetcher.list_servers(&document).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["fetch", "osv"]);

    let osv = fetcher.get_server(&document, "osv").await.unwrap();
    assert_eq!(osv.map(|e| e.image), Some("ghcr.io/stackloklabs/osv-mcp/server:latest".into()));
    assert!(fetcher.get_server(&document, "time").await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_internal_address_is_rejected() {
    let fetcher = fetcher(Duration::from_secs(1));
    let endpoint = ResolvedEndpoint::Api("http://registry-api.svc.cluster.local:8080".into());

    let err = fetcher.list_servers(&endpoint).await.unwrap_err();
    assert!(matches!(err, Error::InvalidEndpoint { .. }));
    assert_eq!(err.kind(), ErrorKind::FetchFailure);
}
