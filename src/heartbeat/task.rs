//! Heartbeat Task
//!
//! The liveness loop: assemble one `Heartbeat` record, make a single
//! publish attempt, sleep for the configured interval, repeat. A failed
//! publish is logged and the next cycle is its retry.

use std::sync::Arc;

use tracing::error;

use crate::bus::Publisher;
use crate::config::HeartbeatConfig;
use crate::types::Heartbeat;

/// Subject name (relative to the agent's namespace) heartbeats are
/// published to.
pub const HEARTBEAT_SUBJECT: &str = "monitoring.heartbeat";

/// The periodic heartbeat task.
pub struct HeartbeatTask<P> {
    node: String,
    subject: String,
    config: HeartbeatConfig,
    publisher: Arc<P>,
}

impl<P: Publisher> HeartbeatTask<P> {
    pub fn new(
        node: impl Into<String>,
        subject: impl Into<String>,
        config: HeartbeatConfig,
        publisher: Arc<P>,
    ) -> Self {
        Self {
            node: node.into(),
            subject: subject.into(),
            config,
            publisher,
        }
    }

    /// Run the heartbeat loop forever. The sleep starts only after the
    /// publish attempt finishes, so heartbeats never overlap.
    pub async fn run(self) {
        loop {
            let heartbeat = Heartbeat::new(self.node.clone());

            if let Err(e) = self.publisher.publish_json(&self.subject, &heartbeat).await {
                error!("failed to publish heartbeat: {}", e);
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Serialize;
    use tokio::time::Instant;

    use crate::bus::BusError;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, serde_json::Value, Instant)>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish_json<T>(&self, subject: &str, message: &T) -> Result<(), BusError>
        where
            T: Serialize + Sync,
        {
            self.published.lock().unwrap().push((
                subject.to_string(),
                serde_json::to_value(message).unwrap(),
                Instant::now(),
            ));
            if self.fail {
                return Err(BusError::Timeout {
                    subject: subject.to_string(),
                    timeout: Duration::from_secs(10),
                });
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_are_spaced_by_at_least_the_interval() {
        let publisher = Arc::new(RecordingPublisher::default());
        let interval = Duration::from_secs(10);

        let task = HeartbeatTask::new(
            "node-1",
            "org.example.monitoring.heartbeat",
            HeartbeatConfig { interval },
            Arc::clone(&publisher),
        );
        let handle = tokio::spawn(task.run());

        // Heartbeats land at t=0, t=10s, t=20s.
        tokio::time::sleep(interval * 2 + Duration::from_millis(1)).await;
        handle.abort();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 3);

        for pair in published.windows(2) {
            assert!(pair[1].2 - pair[0].2 >= interval);
        }

        let (subject, payload, _) = &published[0];
        assert_eq!(subject, "org.example.monitoring.heartbeat");
        assert_eq!(payload["node"], "node-1");
        assert!(payload["dateSent"].as_str().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_does_not_stop_the_loop() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..RecordingPublisher::default()
        });
        let interval = Duration::from_secs(10);

        let task = HeartbeatTask::new(
            "node-1",
            "org.example.monitoring.heartbeat",
            HeartbeatConfig { interval },
            Arc::clone(&publisher),
        );
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(interval + Duration::from_millis(1)).await;
        handle.abort();

        assert_eq!(publisher.published.lock().unwrap().len(), 2);
    }
}
