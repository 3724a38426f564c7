//! The control loop: sleep, sample, decide, act.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info};

use queuescale_metrics::BacklogSource;
use queuescale_scale::WorkloadScaler;

use crate::cooldown::CooldownGate;

/// Thresholds and cadence for the decision policy.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Sleep between ticks, measured from the end of the previous tick.
    pub poll_interval: Duration,
    /// Backlog at or above which a scale-up is attempted.
    pub scale_up_threshold: u64,
    /// Backlog at or below which a scale-down is attempted.
    pub scale_down_threshold: u64,
    pub scale_up_cooldown: Duration,
    pub scale_down_cooldown: Duration,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The metric source produced no signal; no decision was made.
    SampleFailed,
    /// A backlog figure was sampled and the policy ran.
    Decided {
        backlog: u64,
        scaled_up: bool,
        scaled_down: bool,
    },
}

/// Drives the scale policy against one workload.
///
/// Owns the two cooldown gates and nothing else; the backlog comes from
/// the [`BacklogSource`] and the replica count stays in the orchestrator.
pub struct ControlLoop {
    source: Box<dyn BacklogSource>,
    scaler: WorkloadScaler,
    config: ControlConfig,
    up_gate: CooldownGate,
    down_gate: CooldownGate,
}

impl ControlLoop {
    /// Both gates start ready: the loop may act on its very first tick.
    pub fn new(source: Box<dyn BacklogSource>, scaler: WorkloadScaler, config: ControlConfig) -> Self {
        let up_gate = CooldownGate::new(config.scale_up_cooldown);
        let down_gate = CooldownGate::new(config.scale_down_cooldown);
        Self {
            source,
            scaler,
            config,
            up_gate,
            down_gate,
        }
    }

    /// Execute one tick of the policy at `now`.
    ///
    /// The up and down conditions are evaluated independently every tick;
    /// with inverted thresholds both can fire, each through its own gate.
    /// Dependency failures are logged and leave all gate state untouched,
    /// so a failed action is eligible for retry on the very next tick.
    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        let backlog = match self.source.sample().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "failed to sample queue backlog");
                return TickOutcome::SampleFailed;
            }
        };
        info!(backlog, "queue backlog sampled");

        let mut scaled_up = false;
        if backlog >= self.config.scale_up_threshold {
            if self.up_gate.ready(now) {
                match self.scaler.scale_up().await {
                    Ok(()) => {
                        self.up_gate.stamp(now);
                        scaled_up = true;
                    }
                    Err(e) => error!(error = %e, "scale up failed"),
                }
            } else {
                debug!("scale-up cooldown active, holding");
            }
        }

        let mut scaled_down = false;
        if backlog <= self.config.scale_down_threshold {
            if self.down_gate.ready(now) {
                match self.scaler.scale_down().await {
                    Ok(()) => {
                        self.down_gate.stamp(now);
                        scaled_down = true;
                    }
                    Err(e) => error!(error = %e, "scale down failed"),
                }
            } else {
                debug!("scale-down cooldown active, holding");
            }
        }

        TickOutcome::Decided {
            backlog,
            scaled_up,
            scaled_down,
        }
    }

    /// Run ticks at the configured cadence until the shutdown channel
    /// flips.
    ///
    /// Exactly one tick executes at a time; the next sleep starts only
    /// after the current tick completes, so slow dependency calls stretch
    /// the cadence rather than overlap it. Both the sleep and an in-flight
    /// tick are raced against shutdown, so cancellation is prompt even
    /// mid-request.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            up_threshold = self.config.scale_up_threshold,
            down_threshold = self.config.scale_down_threshold,
            "control loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }

            tokio::select! {
                outcome = self.tick(Instant::now()) => {
                    debug!(?outcome, "tick complete");
                }
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use queuescale_metrics::{MetricError, MetricResult};
    use queuescale_scale::{ReplicaApi, ScaleError, ScaleResult, ScalerConfig, WorkloadRef};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct ScriptedSource {
        samples: Mutex<VecDeque<MetricResult<u64>>>,
    }

    impl ScriptedSource {
        fn new(samples: Vec<MetricResult<u64>>) -> Box<Self> {
            Box::new(Self {
                samples: Mutex::new(samples.into()),
            })
        }
    }

    #[async_trait]
    impl BacklogSource for ScriptedSource {
        async fn sample(&self) -> MetricResult<u64> {
            self.samples
                .lock()
                .unwrap()
                .pop_front()
                .expect("sample script exhausted")
        }
    }

    #[derive(Default)]
    struct FakeReplicas {
        count: Mutex<u32>,
        fail_writes: AtomicBool,
        writes: Mutex<Vec<u32>>,
    }

    impl FakeReplicas {
        fn with_count(n: u32) -> Arc<Self> {
            let api = Self::default();
            *api.count.lock().unwrap() = n;
            Arc::new(api)
        }

        fn count(&self) -> u32 {
            *self.count.lock().unwrap()
        }

        fn writes(&self) -> Vec<u32> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplicaApi for FakeReplicas {
        async fn current_replicas(&self, _workload: &WorkloadRef) -> ScaleResult<u32> {
            Ok(self.count())
        }

        async fn set_replicas(&self, workload: &WorkloadRef, replicas: u32) -> ScaleResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ScaleError::MissingReplicas(workload.to_string()));
            }
            *self.count.lock().unwrap() = replicas;
            self.writes.lock().unwrap().push(replicas);
            Ok(())
        }
    }

    fn config(up: u64, down: u64, up_cooldown: u64, down_cooldown: u64) -> ControlConfig {
        ControlConfig {
            poll_interval: Duration::from_secs(5),
            scale_up_threshold: up,
            scale_down_threshold: down,
            scale_up_cooldown: Duration::from_secs(up_cooldown),
            scale_down_cooldown: Duration::from_secs(down_cooldown),
        }
    }

    fn control_loop(
        samples: Vec<MetricResult<u64>>,
        replicas: Arc<FakeReplicas>,
        config: ControlConfig,
    ) -> ControlLoop {
        let scaler = WorkloadScaler::new(
            replicas,
            WorkloadRef::new("worker", "default"),
            ScalerConfig {
                min_replicas: 1,
                max_replicas: 5,
                up_step: 1,
                down_step: 1,
            },
        );
        ControlLoop::new(ScriptedSource::new(samples), scaler, config)
    }

    fn decided(backlog: u64, scaled_up: bool, scaled_down: bool) -> TickOutcome {
        TickOutcome::Decided {
            backlog,
            scaled_up,
            scaled_down,
        }
    }

    #[tokio::test]
    async fn scale_up_fires_when_threshold_is_met() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(150)], replicas.clone(), config(100, 10, 10, 30));

        let outcome = lp.tick(Instant::now()).await;

        assert_eq!(outcome, decided(150, true, false));
        assert_eq!(replicas.count(), 3);
    }

    #[tokio::test]
    async fn threshold_comparisons_are_inclusive() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(100)], replicas.clone(), config(100, 10, 10, 30));
        assert_eq!(lp.tick(Instant::now()).await, decided(100, true, false));

        let replicas = FakeReplicas::with_count(3);
        let mut lp = control_loop(vec![Ok(10)], replicas.clone(), config(100, 10, 10, 30));
        assert_eq!(lp.tick(Instant::now()).await, decided(10, false, true));
    }

    #[tokio::test]
    async fn backlog_between_thresholds_holds() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(50)], replicas.clone(), config(100, 10, 10, 30));

        assert_eq!(lp.tick(Instant::now()).await, decided(50, false, false));
        assert!(replicas.writes().is_empty());
    }

    #[tokio::test]
    async fn scale_up_is_blocked_inside_its_cooldown() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(150), Ok(150)], replicas.clone(), config(100, 10, 10, 30));
        let t0 = Instant::now();

        assert_eq!(lp.tick(t0).await, decided(150, true, false));
        assert_eq!(lp.tick(t0 + Duration::from_secs(5)).await, decided(150, false, false));

        assert_eq!(replicas.writes(), vec![3]);
    }

    #[tokio::test]
    async fn scale_up_fires_again_once_the_cooldown_elapses() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(150), Ok(150)], replicas.clone(), config(100, 10, 10, 30));
        let t0 = Instant::now();

        assert_eq!(lp.tick(t0).await, decided(150, true, false));
        assert_eq!(lp.tick(t0 + Duration::from_secs(10)).await, decided(150, true, false));

        assert_eq!(replicas.writes(), vec![3, 4]);
    }

    #[tokio::test]
    async fn gates_are_independent_per_direction() {
        // A fresh scale-down must not be blocked by the up-gate cooling.
        let replicas = FakeReplicas::with_count(3);
        let mut lp = control_loop(vec![Ok(150), Ok(5)], replicas.clone(), config(100, 10, 60, 30));
        let t0 = Instant::now();

        assert_eq!(lp.tick(t0).await, decided(150, true, false));
        // One second later, well inside the up-cooldown.
        assert_eq!(lp.tick(t0 + Duration::from_secs(1)).await, decided(5, false, true));

        assert_eq!(replicas.writes(), vec![4, 3]);
    }

    #[tokio::test]
    async fn failed_action_does_not_start_a_cooldown() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(vec![Ok(150), Ok(150)], replicas.clone(), config(100, 10, 60, 30));
        let t0 = Instant::now();

        replicas.fail_writes.store(true, Ordering::SeqCst);
        assert_eq!(lp.tick(t0).await, decided(150, false, false));

        // Next tick, one second later: the gate must still be ready.
        replicas.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(lp.tick(t0 + Duration::from_secs(1)).await, decided(150, true, false));

        assert_eq!(replicas.writes(), vec![3]);
    }

    #[tokio::test]
    async fn sample_failure_makes_no_decision() {
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(
            vec![Err(MetricError::MissingCounter("messages_ready".into())), Ok(150)],
            replicas.clone(),
            config(100, 10, 10, 30),
        );
        let t0 = Instant::now();

        assert_eq!(lp.tick(t0).await, TickOutcome::SampleFailed);
        assert!(replicas.writes().is_empty());

        // Gates were untouched: the next tick can act immediately.
        assert_eq!(lp.tick(t0 + Duration::from_secs(5)).await, decided(150, true, false));
    }

    #[tokio::test]
    async fn inverted_thresholds_fire_both_directions_in_one_tick() {
        // down=50 ≥ up=10: a backlog of 30 satisfies both conditions.
        let replicas = FakeReplicas::with_count(3);
        let mut lp = control_loop(vec![Ok(30)], replicas.clone(), config(10, 50, 10, 30));

        let outcome = lp.tick(Instant::now()).await;

        assert_eq!(outcome, decided(30, true, true));
        // Up fires first (3 → 4), then down reads the fresh count (4 → 3).
        assert_eq!(replicas.writes(), vec![4, 3]);
    }

    #[tokio::test]
    async fn inverted_thresholds_still_respect_each_gate() {
        let replicas = FakeReplicas::with_count(3);
        let mut lp = control_loop(
            vec![Ok(30), Ok(30)],
            replicas.clone(),
            config(10, 50, 60, 30),
        );
        let t0 = Instant::now();

        assert_eq!(lp.tick(t0).await, decided(30, true, true));
        // Both gates are now cooling; nothing fires.
        assert_eq!(lp.tick(t0 + Duration::from_secs(5)).await, decided(30, false, false));
    }

    #[tokio::test]
    async fn scale_up_at_max_succeeds_and_stamps_the_gate() {
        let replicas = FakeReplicas::with_count(5);
        let mut lp = control_loop(vec![Ok(150), Ok(150)], replicas.clone(), config(100, 10, 10, 30));
        let t0 = Instant::now();

        // Clamped no-op is a success: no write, gate stamped.
        assert_eq!(lp.tick(t0).await, decided(150, true, false));
        assert!(replicas.writes().is_empty());
        assert_eq!(replicas.count(), 5);

        assert_eq!(lp.tick(t0 + Duration::from_secs(5)).await, decided(150, false, false));
    }

    #[tokio::test]
    async fn burst_then_drain_scenario() {
        // Thresholds {up: 100, down: 10}, cooldowns {up: 10s, down: 30s},
        // bounds {1, 5}, starting at 2 replicas.
        let replicas = FakeReplicas::with_count(2);
        let mut lp = control_loop(
            vec![Ok(150), Ok(150), Ok(5)],
            replicas.clone(),
            config(100, 10, 10, 30),
        );
        let t0 = Instant::now();

        // Burst: scale up to 3.
        assert_eq!(lp.tick(t0).await, decided(150, true, false));
        assert_eq!(replicas.count(), 3);

        // Still bursting 2s later, but inside the up-cooldown: hold.
        assert_eq!(lp.tick(t0 + Duration::from_secs(2)).await, decided(150, false, false));
        assert_eq!(replicas.count(), 3);

        // Drained by t0+11s; the down-gate was never stamped: scale down.
        assert_eq!(lp.tick(t0 + Duration::from_secs(11)).await, decided(5, false, true));
        assert_eq!(replicas.count(), 2);

        assert_eq!(replicas.writes(), vec![3, 2]);
    }
}
