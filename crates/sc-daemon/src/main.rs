// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line entry point for the procurement daemon.

use anyhow::{Context, Result};
use clap::Parser;
use sc_chain::{FieldCoupling, SupplyChain, SupplyLink, TimeUnit};
use sc_core::{Procurement, SupplierId, SupplyChainId};
use sc_handler_core::{DownstreamRegistry, HandlerRegistry, InMemoryDownstreamProcessor};
use sc_handlers::{DomainReport, FileReport, IpAddressReport, RescanReport, UrlReport, UrlScan, VirusTotalClient};
use sc_manifest_store::ManifestStore;
use sc_requisition::{ParamType, ParameterSpec, Requisition};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Procurement pipeline HTTP daemon.
#[derive(Parser, Debug)]
#[command(name = "sc-daemon", version, about)]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory manifests are persisted under, overriding the config file.
    #[arg(long)]
    manifests_dir: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(long)]
    debug: bool,

    /// Maximum number of queued-but-unstarted orders.
    #[arg(long, default_value_t = 256)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = sc_config::load_config(args.config.as_deref()).context("loading configuration")?;
    sc_config::apply_env_overrides(&mut config);
    if let Some(dir) = &args.manifests_dir {
        config.manifests_dir = Some(dir.to_string_lossy().into_owned());
    }
    for warning in sc_config::validate_config(&config).context("validating configuration")? {
        tracing::warn!(%warning, "configuration warning");
    }

    let manifests_dir = config.manifests_dir.clone().unwrap_or_else(|| "./manifests".to_string());
    let store = ManifestStore::new(PathBuf::from(manifests_dir));

    let registry = build_handler_registry();
    let downstream = DownstreamRegistry::new(std::sync::Arc::new(InMemoryDownstreamProcessor::new()));
    let executor = sc_executor::Executor::new(registry, vec![], vec![], store, downstream);

    let catalog = domain_report_catalog();
    let state = sc_daemon::AppState::new(catalog, executor, args.queue_capacity);

    let worker_state = state.clone();
    tokio::spawn(sc_daemon::run_worker_loop(worker_state));

    let app = sc_daemon::build_app(state);

    tracing::info!(bind = %args.bind, "starting procurement daemon");
    let listener = tokio::net::TcpListener::bind(args.bind).await.context("binding listener")?;
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}

fn build_handler_registry() -> HandlerRegistry {
    let client = VirusTotalClient::new();
    let mut registry = HandlerRegistry::new();
    registry.register(std::sync::Arc::new(DomainReport(client.clone())));
    registry.register(std::sync::Arc::new(IpAddressReport(client.clone())));
    registry.register(std::sync::Arc::new(FileReport(client.clone())));
    registry.register(std::sync::Arc::new(RescanReport(client.clone())));
    registry.register(std::sync::Arc::new(UrlScan(client.clone())));
    registry.register(std::sync::Arc::new(UrlReport(client)));
    registry
}

/// The single built-in Procurement this daemon ships: a one-link VirusTotal
/// domain report chain. Real deployments would load their catalog from
/// configuration; this keeps the daemon runnable out of the box.
fn domain_report_catalog() -> Vec<(Procurement, SupplyChain)> {
    let requisition = Requisition::new(
        SupplierId::new(),
        "domain_report",
        "/api/v3/domains/{id}",
        true,
        vec![ParameterSpec::required("domain", ParamType::String)],
    );
    let chain_id = SupplyChainId::new();
    let link = SupplyLink::new(
        chain_id,
        requisition,
        0,
        0,
        TimeUnit::S,
        vec![FieldCoupling::new("domain", "domain")],
    );
    let chain = SupplyChain::new("domain_report", vec![link]);
    let procurement = Procurement::new("domain_report", chain.id);
    vec![(procurement, chain)]
}
