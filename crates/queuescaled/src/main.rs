//! queuescaled — queue-backlog driven replica autoscaling daemon.
//!
//! Wires three pieces together and runs until Ctrl-C:
//! - an HTTP queue-stats backlog source
//! - a Kubernetes scale-subresource actuator
//! - the cooldown-gated control loop
//!
//! # Usage
//!
//! ```text
//! queuescaled \
//!     --deployment worker --namespace jobs \
//!     --queue-stats-url http://rabbitmq:15672/api/queues/%2f/jobs \
//!     --scale-up-threshold 100 --scale-down-threshold 10
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use queuescale_control::ControlLoop;
use queuescale_metrics::HttpQueueSource;
use queuescale_scale::{KubeScaleApi, WorkloadScaler};

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,queuescaled=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let scaler_config = cli.scaler_config();
    scaler_config.validate()?;

    if cli.scale_down_threshold >= cli.scale_up_threshold {
        warn!(
            up = cli.scale_up_threshold,
            down = cli.scale_down_threshold,
            "scale-down threshold is not below scale-up threshold; both directions can fire in the same tick"
        );
    }

    let request_timeout = Duration::from_secs(cli.request_timeout);

    // Backlog source.
    let source = HttpQueueSource::new(cli.queue_source_config()?)?;
    info!(url = %cli.queue_stats_url, "queue stats source initialized");

    // Scale actuator.
    let api: Arc<KubeScaleApi> = match &cli.kube_api_url {
        Some(base_url) => Arc::new(KubeScaleApi::new(base_url.as_str(), request_timeout)?),
        None => Arc::new(KubeScaleApi::from_cluster_env(request_timeout)?),
    };
    let workload = cli.workload();
    info!(workload = %workload, "scale actuator initialized");

    let scaler = WorkloadScaler::new(api, workload, scaler_config);
    let mut control = ControlLoop::new(Box::new(source), scaler, cli.control_config());

    // Graceful shutdown on Ctrl-C.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = tokio::spawn(async move {
        control.run(shutdown_rx).await;
    });

    info!("queuescaled started");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = loop_handle.await;
    info!("queuescaled stopped");
    Ok(())
}
