//! queuescale-control — the decision loop.
//!
//! One tick: sample the backlog, check the scale-up and scale-down
//! thresholds independently, and invoke the actuator through a
//! per-direction cooldown gate. The loop holds no state beyond the two
//! gates, and a gate only moves on a *successful* action in its
//! direction.
//!
//! # Decision policy
//!
//! ```text
//! backlog ≥ up_threshold   and up-gate ready   → scale_up();  stamp on success
//! backlog ≤ down_threshold and down-gate ready → scale_down(); stamp on success
//! ```
//!
//! The two conditions are not exclusive branches: with inverted
//! thresholds (down ≥ up) a single tick can attempt both directions,
//! each consulting its own gate. Threshold ordering is not validated.
//!
//! Cooldown expiry is evaluated lazily from the stored timestamps at each
//! tick; the fixed poll cadence makes a separate timer unnecessary, at
//! the cost of expiry granularity equal to the poll interval.

pub mod controller;
pub mod cooldown;

pub use controller::{ControlConfig, ControlLoop, TickOutcome};
pub use cooldown::CooldownGate;
