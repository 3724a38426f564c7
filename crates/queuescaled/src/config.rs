//! Flag surface and startup validation.
//!
//! Every value here is fixed for the process lifetime; the flags parse
//! into owned config values handed to the component constructors, and
//! nothing reads them afterwards.

use std::time::Duration;

use clap::Parser;

use queuescale_control::ControlConfig;
use queuescale_metrics::QueueSourceConfig;
use queuescale_scale::{ScalerConfig, WorkloadRef};

#[derive(Debug, Parser)]
#[command(name = "queuescaled", about = "Scales a deployment to track queue backlog")]
pub struct Cli {
    /// Seconds between backlog polls.
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Backlog size at or above which the workload scales up.
    #[arg(long, default_value_t = 100)]
    pub scale_up_threshold: u64,

    /// Backlog size at or below which the workload scales down.
    #[arg(long, default_value_t = 10)]
    pub scale_down_threshold: u64,

    /// Seconds to hold after a scale-up before the next one.
    #[arg(long, default_value_t = 10)]
    pub scale_up_cooldown: u64,

    /// Seconds to hold after a scale-down before the next one.
    #[arg(long, default_value_t = 30)]
    pub scale_down_cooldown: u64,

    /// Replicas added per scale-up.
    #[arg(long, default_value_t = 1)]
    pub scale_up_step: u32,

    /// Replicas removed per scale-down.
    #[arg(long, default_value_t = 1)]
    pub scale_down_step: u32,

    /// Lower replica bound.
    #[arg(long, default_value_t = 1)]
    pub min_replicas: u32,

    /// Upper replica bound.
    #[arg(long, default_value_t = 5)]
    pub max_replicas: u32,

    /// Deployment to scale.
    #[arg(long)]
    pub deployment: String,

    /// Namespace the deployment runs in.
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Queue management stats endpoint serving a JSON object of counters.
    #[arg(long)]
    pub queue_stats_url: String,

    /// Comma-separated counter fields summed into the backlog figure.
    #[arg(long, default_value = "messages_ready,messages_unacknowledged")]
    pub queue_counters: String,

    /// Basic-auth user for the stats endpoint.
    #[arg(long)]
    pub queue_user: Option<String>,

    /// Basic-auth password for the stats endpoint.
    #[arg(long)]
    pub queue_password: Option<String>,

    /// Kubernetes API base URL; in-cluster credentials are used when omitted.
    #[arg(long)]
    pub kube_api_url: Option<String>,

    /// Seconds allowed per request to either collaborator.
    #[arg(long, default_value_t = 10)]
    pub request_timeout: u64,
}

impl Cli {
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            scale_up_threshold: self.scale_up_threshold,
            scale_down_threshold: self.scale_down_threshold,
            scale_up_cooldown: Duration::from_secs(self.scale_up_cooldown),
            scale_down_cooldown: Duration::from_secs(self.scale_down_cooldown),
        }
    }

    pub fn scaler_config(&self) -> ScalerConfig {
        ScalerConfig {
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
            up_step: self.scale_up_step,
            down_step: self.scale_down_step,
        }
    }

    pub fn workload(&self) -> WorkloadRef {
        WorkloadRef::new(&self.deployment, &self.namespace)
    }

    pub fn queue_source_config(&self) -> anyhow::Result<QueueSourceConfig> {
        let auth = self.queue_user.as_ref().map(|user| {
            let password = self.queue_password.clone().unwrap_or_default();
            (user.clone(), password)
        });

        Ok(QueueSourceConfig {
            stats_url: self.queue_stats_url.clone(),
            counters: parse_counters(&self.queue_counters)?,
            auth,
            request_timeout: Duration::from_secs(self.request_timeout),
        })
    }
}

/// Split a comma-separated counter list, trimming whitespace and dropping
/// empty entries.
pub fn parse_counters(raw: &str) -> anyhow::Result<Vec<String>> {
    let counters: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    anyhow::ensure!(!counters.is_empty(), "queue counter list is empty");
    Ok(counters)
}
