// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use std::sync::Arc;
use std::time::Duration;
use terry::{
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, ENV_CONTROLLER_NAMESPACE,
        ERROR_REQUEUE_DURATION_SECS, KIND_CONFIGURATION, KIND_PROVIDER,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    crd::{Configuration, Provider},
    metrics,
    reconcilers::{configuration::types::ReconcileOutcome, reconcile_configuration, reconcile_provider},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// Context shared by the Configuration controller.
struct ControllerContext {
    client: Client,
    /// Centralized-mode namespace; unset means per-tenant layout.
    controller_namespace: Option<String>,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("terry-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Terraform Controller");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config() -> LeaderElectionConfig {
    let enabled = std::env::var("TERRY_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name =
        std::env::var("TERRY_LEASE_NAME").unwrap_or_else(|_| "terry-leader".to_string());

    let lease_namespace = std::env::var("TERRY_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| "terraform-system".to_string());

    let lease_duration = std::env::var("TERRY_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("TERRY_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("terry-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

/// Create a semantic watcher configuration.
///
/// Only triggers on semantic changes (spec modifications), ignoring
/// status-only updates. This prevents reconciliation loops when the
/// controllers update status fields; progress is driven by the explicit
/// requeue hints instead.
#[inline]
fn semantic_watcher_config() -> Config {
    Config::default().any_semantic()
}

async fn async_main() -> Result<()> {
    initialize_logging();

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let controller_namespace = std::env::var(ENV_CONTROLLER_NAMESPACE)
        .ok()
        .filter(|namespace| !namespace.is_empty());
    match controller_namespace.as_deref() {
        Some(namespace) => info!(
            namespace = %namespace,
            "Centralized mode: all execution jobs run in the controller namespace"
        ),
        None => info!("Per-tenant mode: execution jobs run next to their Configurations"),
    }

    let _metrics_handle = start_metrics_server();

    let config = load_leader_election_config();

    if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled"
        );

        info!("Starting leader election, waiting to acquire leadership...");

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.retry_period)
            .build()
            .await?;

        let (leader_rx, lease_handle) = lease_manager.watch().await;

        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired, starting controllers");

        run_controllers_with_leader_election(
            client,
            controller_namespace,
            leader_rx,
            lease_handle,
        )
        .await?;
    } else {
        run_controllers_without_leader_election(client, controller_namespace).await?;
    }

    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Run both controllers until one exits
async fn run_all_controllers(client: Client, controller_namespace: Option<String>) -> Result<()> {
    tokio::select! {
        result = run_configuration_controller(client.clone(), controller_namespace) => {
            error!("CRITICAL: Configuration controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Configuration controller exited unexpectedly without error")
        }
        result = run_provider_controller(client.clone()) => {
            error!("CRITICAL: Provider controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Provider controller exited unexpectedly without error")
        }
    }
}

/// Run controllers with leader election monitoring and signal handling
async fn run_controllers_with_leader_election(
    client: Client,
    controller_namespace: Option<String>,
    leader_rx: tokio::sync::watch::Receiver<bool>,
    _lease_handle: tokio::task::JoinHandle<
        Result<LeaseManager, kube_lease_manager::LeaseManagerError>,
    >,
) -> Result<()> {
    info!("Running controllers with leader election and signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = wait_for_sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = monitor_leadership(leader_rx) => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping all controllers...");
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }

        result = run_all_controllers(client, controller_namespace) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully, leader election lease released");
    Ok(())
}

/// Run both controllers without leader election, with signal handling
async fn run_controllers_without_leader_election(
    client: Client,
    controller_namespace: Option<String>,
) -> Result<()> {
    warn!("Leader election DISABLED - running without high availability");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = wait_for_sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = run_all_controllers(client, controller_namespace) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

async fn wait_for_sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        // On non-Unix platforms, just wait forever
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Run the `Configuration` controller
async fn run_configuration_controller(
    client: Client,
    controller_namespace: Option<String>,
) -> Result<()> {
    info!("Starting Configuration controller");

    let api = Api::<Configuration>::all(client.clone());
    let context = Arc::new(ControllerContext {
        client,
        controller_namespace,
    });

    Controller::new(api, semantic_watcher_config())
        .run(reconcile_configuration_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `Provider` controller
async fn run_provider_controller(client: Client) -> Result<()> {
    info!("Starting Provider controller");

    let api = Api::<Provider>::all(client.clone());

    Controller::new(api, semantic_watcher_config())
        .run(reconcile_provider_wrapper, error_policy, Arc::new(client))
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Configuration`
async fn reconcile_configuration_wrapper(
    configuration: Arc<Configuration>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        name = %configuration.name_any(),
        namespace = ?configuration.namespace(),
        "Reconcile wrapper called for Configuration"
    );

    let result = reconcile_configuration(
        &ctx.client,
        &configuration,
        ctx.controller_namespace.as_deref(),
    )
    .await;
    let duration = start.elapsed();

    match result {
        Ok(outcome) => {
            metrics::record_reconciliation_success(KIND_CONFIGURATION, duration);
            match outcome {
                ReconcileOutcome::Done => Ok(Action::await_change()),
                ReconcileOutcome::RequeueAfter(delay) => Ok(Action::requeue(delay)),
            }
        }
        Err(e) => {
            error!(
                "Failed to reconcile Configuration {}: {e:#}",
                configuration.name_any()
            );
            metrics::record_reconciliation_error(KIND_CONFIGURATION, duration);
            metrics::record_error(KIND_CONFIGURATION, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `Provider`
async fn reconcile_provider_wrapper(
    provider: Arc<Provider>,
    ctx: Arc<Client>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    let result = reconcile_provider(&ctx, &provider).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!("Successfully reconciled Provider: {}", provider.name_any());
            metrics::record_reconciliation_success(KIND_PROVIDER, duration);
            Ok(Action::await_change())
        }
        Err(e) => {
            error!("Failed to reconcile Provider {}: {e:#}", provider.name_any());
            metrics::record_reconciliation_error(KIND_PROVIDER, duration);
            metrics::record_error(KIND_PROVIDER, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Generic error policy for both controllers.
///
/// Requeues after a short fixed delay; API conflicts and transient failures
/// resolve on the next pass.
fn error_policy<T, C>(_resource: Arc<T>, _err: &ReconcileError, _ctx: Arc<C>) -> Action
where
    T: std::fmt::Debug,
{
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
