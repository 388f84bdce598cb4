// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use csi_operator::{
    config::OperatorConfig,
    constants::{CONTROLLER_NAME, DEFAULT_METRICS_BIND_ADDRESS, TOKIO_WORKER_THREADS},
    controller::run_controller,
    events::KubeEventPublisher,
    metrics::serve_metrics,
    reconcilers::Reconciler,
    store::KubeStore,
};
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Operator that deploys CSI drivers described by `CSIDriverDeployment` resources
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Operator configuration file (YAML). Defaults apply when omitted.
    #[arg(long, env = "CSI_OPERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Address of the `/metrics` and `/healthz` endpoint
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: String,

    /// Only reconcile resources in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Version reported on the `ClusterOperator`, overriding the configuration
    #[arg(long, env = "RELEASE_VERSION")]
    release_version: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name(CONTROLLER_NAME)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_tracing() {
    // RUST_LOG selects the level, RUST_LOG_FORMAT=json switches to JSON lines
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
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();

    info!("Starting CSI driver operator");
    debug!(?args, "Parsed command line");

    let mut config = OperatorConfig::load_or_default(args.config.as_deref())?;
    if let Some(version) = args.release_version.clone() {
        config.operator_version = version;
    }
    debug!(?config, "Operator configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let reconciler = Arc::new(Reconciler::new(
        KubeStore::new(client.clone()),
        KubeEventPublisher::new(client.clone(), CONTROLLER_NAME),
        config,
    ));

    // Neither task is expected to return; either one ending stops the process
    tokio::select! {
        result = run_controller(client, reconciler, args.watch_namespace) => {
            error!("CRITICAL: CSIDriverDeployment controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("CSIDriverDeployment controller exited unexpectedly without error")
        }
        result = serve_metrics(&args.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}
