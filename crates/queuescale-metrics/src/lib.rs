//! queuescale-metrics — queue backlog sampling.
//!
//! The control loop asks one question of the queue: "how deep is the
//! backlog right now?". [`BacklogSource`] is that boundary. The concrete
//! [`HttpQueueSource`] answers it from a management-API style JSON stats
//! endpoint, summing a configured allow-list of counter fields (visible,
//! in-flight, delayed, …) into a single figure.
//!
//! A failed sample yields an error, never a stale count; the loop skips
//! the tick and retries at its next poll.

pub mod error;
pub mod source;

pub use error::{MetricError, MetricResult};
pub use source::{BacklogSource, HttpQueueSource, QueueSourceConfig};
