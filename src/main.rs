use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use approval_monitor::anomaly::engine::join_reset_task;
use approval_monitor::config::Config;
use approval_monitor::indexer::chain::run_chain_follower;
use approval_monitor::pipeline::{ApprovalPipeline, StdoutAlertSink};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output).
    // Logs go to stderr so stdout carries only findings.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Approval Monitor starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        chain = %config.chain.name,
        emission_threshold = config.approval_monitor.emission_threshold,
        max_findings = config.approval_monitor.max_findings,
        quota_scope = ?config.approval_monitor.quota_scope,
        reset_interval_secs = config.approval_monitor.reset_interval_secs,
        "Configuration loaded from {}",
        config_path
    );

    let pipeline = ApprovalPipeline::init(&config, Box::new(StdoutAlertSink))?;

    // Create shutdown signal
    let shutdown = CancellationToken::new();

    let reset_handle = pipeline.monitor.spawn_reset_task(shutdown.clone());

    let follower_shutdown = shutdown.clone();
    let chain_config = config.chain.clone();
    let follower = async {
        if let Err(e) = run_chain_follower(chain_config, follower_shutdown, &pipeline).await {
            tracing::error!(chain = %config.chain.name, error = %e, "Chain follower failed");
        }
    };

    tracing::info!("Approval monitor running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = follower => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutdown signal received, stopping...");
        }
    }
    shutdown.cancel();
    join_reset_task(reset_handle).await;

    tracing::info!(
        metrics = %pipeline.metrics.to_prometheus_text(),
        "Approval Monitor stopped gracefully"
    );
    Ok(())
}
