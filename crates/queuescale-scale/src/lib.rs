//! queuescale-scale — bounded replica adjustment for an orchestrated workload.
//!
//! [`ReplicaApi`] is the orchestrator boundary: read and write the replica
//! count of a workload addressed by `{name, namespace}`. [`KubeScaleApi`]
//! implements it against the Kubernetes `apps/v1` deployments scale
//! subresource. [`WorkloadScaler`] owns the min/max/step configuration and
//! performs the clamp arithmetic around fresh reads.
//!
//! The replica count is externally owned state: every adjustment reads it
//! live immediately before writing, and asking to scale past a bound is a
//! no-op success rather than an error.

pub mod api;
pub mod error;
pub mod scaler;

pub use api::{KubeScaleApi, ReplicaApi, WorkloadRef};
pub use error::{ScaleError, ScaleResult};
pub use scaler::{ScalerConfig, WorkloadScaler};
