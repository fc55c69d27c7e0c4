//! Heartbeat
//!
//! Periodic liveness reporting: one record on the monitoring subject per
//! interval, independent of every other task.

pub mod task;

pub use task::{HeartbeatTask, HEARTBEAT_SUBJECT};
