use std::path::Path;
use std::sync::Arc;

use dstore::file_io::open_file_for_append;
use dstore::gather_metrics;
use dstore::Error;
use dstore::LocalCluster;
use dstore::MemberNodeBuilder;
use dstore::NoMemberFaults;
use dstore::Result;
use dstore::Settings;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    let _guard = init_observability(&settings.cluster.member_name, &settings.cluster.log_dir)?;

    // Every configured member runs in this process
    let cluster = Arc::new(LocalCluster::with_members(
        settings.cluster.members.clone(),
        Arc::new(NoMemberFaults),
    ));
    let mut nodes = Vec::new();
    for member in &settings.cluster.members {
        let mut member_settings = settings.clone();
        member_settings.cluster.member_name = member.name.clone();
        let node = MemberNodeBuilder::from_settings(&member_settings, cluster.clone())?.build()?;
        cluster.join(&node);
        nodes.push(node);
    }

    let mut handles = Vec::new();
    if settings.housekeeping.enabled {
        for node in &nodes {
            handles.push(node.start_housekeeping());
        }
    }

    info!(
        "{} members started. Waiting for CTRL+C signal...",
        settings.cluster.members.len()
    );
    if let Err(e) = graceful_shutdown().await {
        error!("Failed to wait for shutdown signal: {:?}", e);
    }

    for handle in handles {
        if let Err(e) = handle.stop().await {
            error!("Failed to stop housekeeping: {:?}", e);
        }
    }
    for node in &nodes {
        if let Err(e) = node.transfer_log().flush() {
            error!("Failed to flush transfer log of {}: {:?}", node.name(), e);
        }
    }

    info!("Final metrics:\n{}", gather_metrics());
    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    info!("Shutdown server..");
    Ok(())
}

pub fn init_observability(
    member_name: &str,
    log_dir: &Path,
) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join(member_name).join("d.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
