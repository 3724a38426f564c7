//! Bounded replica adjustment.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ReplicaApi, WorkloadRef};
use crate::error::{ScaleError, ScaleResult};

/// Replica bounds and step sizes, fixed at startup.
#[derive(Debug, Clone)]
pub struct ScalerConfig {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Replicas added per scale-up.
    pub up_step: u32,
    /// Replicas removed per scale-down.
    pub down_step: u32,
}

impl ScalerConfig {
    /// Startup invariants: `min ≤ max`, both steps positive.
    pub fn validate(&self) -> ScaleResult<()> {
        if self.min_replicas > self.max_replicas {
            return Err(ScaleError::InvalidConfig(format!(
                "min replicas ({}) exceeds max replicas ({})",
                self.min_replicas, self.max_replicas
            )));
        }
        if self.up_step == 0 || self.down_step == 0 {
            return Err(ScaleError::InvalidConfig(
                "scale steps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Applies bounded replica adjustments to one workload.
///
/// Every adjustment reads the live replica count immediately before
/// writing; another controller or a manual edit may have moved it since
/// the previous tick. Being asked to scale past a bound is a no-op
/// success, not an error.
pub struct WorkloadScaler {
    api: Arc<dyn ReplicaApi>,
    workload: WorkloadRef,
    config: ScalerConfig,
}

impl WorkloadScaler {
    pub fn new(api: Arc<dyn ReplicaApi>, workload: WorkloadRef, config: ScalerConfig) -> Self {
        Self {
            api,
            workload,
            config,
        }
    }

    /// Add `up_step` replicas, clamped to `max_replicas`.
    pub async fn scale_up(&self) -> ScaleResult<()> {
        let current = self.api.current_replicas(&self.workload).await?;
        if current >= self.config.max_replicas {
            debug!(workload = %self.workload, current, "already at max replicas");
            return Ok(());
        }

        let target = current
            .saturating_add(self.config.up_step)
            .min(self.config.max_replicas);
        self.api.set_replicas(&self.workload, target).await?;

        info!(workload = %self.workload, from = current, to = target, "scaled up");
        Ok(())
    }

    /// Remove `down_step` replicas, clamped to `min_replicas`.
    pub async fn scale_down(&self) -> ScaleResult<()> {
        let current = self.api.current_replicas(&self.workload).await?;
        if current <= self.config.min_replicas {
            debug!(workload = %self.workload, current, "already at min replicas");
            return Ok(());
        }

        let target = current
            .saturating_sub(self.config.down_step)
            .max(self.config.min_replicas);
        self.api.set_replicas(&self.workload, target).await?;

        info!(workload = %self.workload, from = current, to = target, "scaled down");
        Ok(())
    }
}
