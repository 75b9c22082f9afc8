//! MCP Registry Operator
//!
//! Keeps MCPRegistry resources in sync with their sources and serves the
//! admin API for registries, deployed servers and orphaned servers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────────┐   ┌─────────────────────────────┐
//! │ Sync Scheduler│──►│ Registry Manager │◄──│ Admin REST API              │
//! └───────────────┘   └────────┬─────────┘   └─────────────────────────────┘
//!                              │
//!          ┌───────────────────┼─────────────────────┐
//!          ▼                   ▼                     ▼
//!   Endpoint Fetcher     Store (kube or memory)   Metrics / Health
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_registry_operator::{
    ApiServer, ApiServerConfig, EndpointFetcher, Error, FetcherConfig, ManagerConfig, MemoryStore,
    OperatorMetrics, RegistryManager, Result, SampleFetcher, SchedulerConfig, ServerListFetcher,
    StoreBackend, StoreFactory, SyncScheduler,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// MCP Registry Operator - registry sync and MCP server reconciliation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Seconds between scheduler evaluations
    #[arg(long, env = "SYNC_TICK_SECS", default_value = "30")]
    sync_tick_secs: u64,

    /// Upper bound in seconds for one sync
    #[arg(long, env = "SYNC_TIMEOUT_SECS", default_value = "60")]
    sync_timeout_secs: u64,

    /// Upper bound in seconds for one store call
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value = "10")]
    store_timeout_secs: u64,

    /// Upper bound in seconds for one endpoint fetch
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "15")]
    fetch_timeout_secs: u64,

    /// Cluster DNS domain used to recognize in-cluster services
    #[arg(long, env = "CLUSTER_DOMAIN", default_value = "cluster.local")]
    cluster_domain: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run in standalone mode (in-memory store, no Kubernetes)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    /// Serve built-in sample servers instead of fetching (development only)
    #[arg(long, env = "DEV_SAMPLE_DATA")]
    dev_sample_data: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting MCP Registry Operator");
    info!("  Version: {}", mcp_registry_operator::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Standalone mode: {}", args.standalone);

    let kube_client = if args.standalone {
        None
    } else {
        Some(kube::Client::try_default().await?)
    };

    // Stores
    let backend = match &kube_client {
        Some(client) => StoreBackend::Kube(client.clone()),
        None => StoreBackend::Memory(Arc::new(MemoryStore::new())),
    };
    let stores = StoreFactory::create(backend, Duration::from_secs(args.store_timeout_secs));

    // Fetcher
    let fetcher: Arc<dyn ServerListFetcher> = if args.dev_sample_data {
        warn!("Serving built-in sample data; registry endpoints are not contacted");
        Arc::new(SampleFetcher::new())
    } else {
        let config = FetcherConfig {
            request_timeout: Duration::from_secs(args.fetch_timeout_secs),
            cluster_domain: args.cluster_domain.clone(),
            ..Default::default()
        };
        Arc::new(EndpointFetcher::new(config, kube_client.clone())?)
    };

    let metrics = Arc::new(OperatorMetrics::new()?);

    // Create manager
    let manager = RegistryManager::new(
        ManagerConfig {
            sync_timeout: Duration::from_secs(args.sync_timeout_secs),
        },
        stores.registries,
        stores.servers,
        fetcher,
        metrics.clone(),
    );

    let (shutdown_tx, _) = broadcast::channel(1);

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let served_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, served_metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Start scheduler
    let scheduler = SyncScheduler::new(
        SchedulerConfig {
            tick_interval: Duration::from_secs(args.sync_tick_secs.max(1)),
        },
        manager.clone(),
    );
    let scheduler_shutdown = shutdown_tx.subscribe();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

    // Create and run API server
    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
    };
    let api_server = ApiServer::new(api_config, manager, shutdown_tx.clone());

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = signal_tx.send(());
        }
    });

    info!("Starting admin API server");
    api_server.run().await?;

    let _ = shutdown_tx.send(());
    let _ = scheduler_handle.await;

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "tower_http=info", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(status: hyper::StatusCode, body: &'static str) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(hyper::Body::from(body));
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => text_response(StatusCode::OK, "ok"),
                _ => text_response(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, metrics: Arc<OperatorMetrics>) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode() {
                            Ok((content_type, buffer)) => {
                                let mut response = Response::new(Body::from(buffer));
                                if let Ok(value) = content_type.parse() {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => {
                                error!("Failed to encode metrics: {}", e);
                                text_response(StatusCode::INTERNAL_SERVER_ERROR, "encode failed")
                            }
                        },
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
