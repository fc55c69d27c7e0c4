//! DNS Checks
//!
//! The periodic hostname-resolution task. Each cycle resolves every
//! configured external hostname, then every internal hostname, assembles
//! one `DnsCheckResult`, and makes a single publish attempt. The task
//! sleeps only after the publish attempt finishes, so a slow resolver
//! stretches the effective interval instead of piling up cycles.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::{debug, error, warn};

use crate::bus::Publisher;
use crate::config::DnsCheckConfig;
use crate::types::{DnsCheckResult, DnsLookup, LookupDirection};

/// Subject name (relative to the agent's namespace) DNS results are
/// published to.
pub const DNS_SUBJECT: &str = "monitoring.dns";

/// Host-name to address resolution.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system's resolver via tokio.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        // lookup_host wants a port; it plays no part in the results.
        let addrs = lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// The periodic DNS-check task.
pub struct DnsCheckTask<P, R> {
    node: String,
    subject: String,
    config: DnsCheckConfig,
    publisher: Arc<P>,
    resolver: R,
}

impl<P, R> DnsCheckTask<P, R>
where
    P: Publisher,
    R: Resolver,
{
    pub fn new(
        node: impl Into<String>,
        subject: impl Into<String>,
        config: DnsCheckConfig,
        publisher: Arc<P>,
        resolver: R,
    ) -> Self {
        Self {
            node: node.into(),
            subject: subject.into(),
            config,
            publisher,
            resolver,
        }
    }

    /// Run the check loop forever: one cycle, one publish attempt, then
    /// sleep for the configured interval. A failed publish is logged and
    /// the next cycle proceeds normally.
    pub async fn run(self) {
        loop {
            let result = self.run_cycle().await;

            if let Err(e) = self.publisher.publish_json(&self.subject, &result).await {
                error!("failed to publish DNS check result: {}", e);
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Resolve every configured hostname and assemble one result record.
    ///
    /// External hostnames are resolved first, then internal ones, each
    /// group in its configured order. A failed lookup is recorded inline
    /// and never aborts the remaining lookups.
    pub async fn run_cycle(&self) -> DnsCheckResult {
        let mut lookups = Vec::with_capacity(
            self.config.external_hostnames.len() + self.config.internal_hostnames.len(),
        );

        for host in &self.config.external_hostnames {
            lookups.push(self.lookup(host, LookupDirection::External).await);
        }

        for host in &self.config.internal_hostnames {
            lookups.push(self.lookup(host, LookupDirection::Internal).await);
        }

        DnsCheckResult::new(self.node.clone(), lookups)
    }

    async fn lookup(&self, host: &str, direction: LookupDirection) -> DnsLookup {
        match self.resolver.resolve(host).await {
            Ok(addresses) if addresses.is_empty() => {
                warn!("lookup of {} returned no addresses", host);
                DnsLookup::failed(host, direction, "no addresses found")
            }
            Ok(addresses) => {
                debug!("resolved {} to {} addresses", host, addresses.len());
                let addresses = addresses.iter().map(IpAddr::to_string).collect();
                DnsLookup::resolved(host, direction, addresses)
            }
            Err(e) => {
                warn!("failed to resolve {}: {}", host, e);
                DnsLookup::failed(host, direction, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde::Serialize;
    use tokio::time::Instant;

    use crate::bus::BusError;

    /// Resolver that answers from a fixed table; unknown hosts fail.
    struct TableResolver {
        table: HashMap<String, Vec<IpAddr>>,
    }

    impl TableResolver {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            let table = entries
                .iter()
                .map(|(host, addrs)| {
                    let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
                    (host.to_string(), addrs)
                })
                .collect();
            Self { table }
        }
    }

    #[async_trait]
    impl Resolver for TableResolver {
        async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
            match self.table.get(host) {
                Some(addrs) => Ok(addrs.clone()),
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such host: {}", host),
                )),
            }
        }
    }

    /// Publisher that records every message it is handed, along with the
    /// instant of each publish attempt.
    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, serde_json::Value)>>,
        instants: Mutex<Vec<Instant>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn publish_count(&self) -> usize {
            self.instants.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish_json<T>(&self, subject: &str, message: &T) -> Result<(), BusError>
        where
            T: Serialize + Sync,
        {
            self.instants.lock().unwrap().push(Instant::now());
            if self.fail {
                return Err(BusError::Timeout {
                    subject: subject.to_string(),
                    timeout: Duration::from_secs(10),
                });
            }
            self.published
                .lock()
                .unwrap()
                .push((subject.to_string(), serde_json::to_value(message).unwrap()));
            Ok(())
        }
    }

    fn task_config(external: &[&str], internal: &[&str]) -> DnsCheckConfig {
        DnsCheckConfig {
            interval: Duration::from_secs(60),
            internal_hostnames: internal.iter().map(|s| s.to_string()).collect(),
            external_hostnames: external.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_cycle_records_external_then_internal_in_order() {
        let resolver = TableResolver::new(&[
            ("a.example", &["192.0.2.1"]),
            ("b.example", &["192.0.2.2", "192.0.2.3"]),
            ("db.internal", &["10.0.0.7"]),
        ]);
        let publisher = Arc::new(RecordingPublisher::default());
        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            task_config(&["a.example", "b.example"], &["db.internal", "cache.internal"]),
            publisher,
            resolver,
        );

        let result = task.run_cycle().await;

        assert_eq!(result.node, "node-1");
        assert_eq!(result.lookups.len(), 4);

        let hosts: Vec<&str> = result.lookups.iter().map(|l| l.host.as_str()).collect();
        assert_eq!(hosts, ["a.example", "b.example", "db.internal", "cache.internal"]);

        assert_eq!(result.lookups[0].direction, LookupDirection::External);
        assert_eq!(result.lookups[1].direction, LookupDirection::External);
        assert_eq!(result.lookups[2].direction, LookupDirection::Internal);
        assert_eq!(result.lookups[3].direction, LookupDirection::Internal);
    }

    #[tokio::test]
    async fn test_failed_lookup_recorded_inline() {
        let resolver = TableResolver::new(&[("a.example", &["192.0.2.1"])]);
        let publisher = Arc::new(RecordingPublisher::default());
        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            task_config(&["a.example", "b.invalid"], &[]),
            publisher,
            resolver,
        );

        let result = task.run_cycle().await;
        assert_eq!(result.lookups.len(), 2);

        let ok = &result.lookups[0];
        assert!(ok.is_resolved());
        assert_eq!(ok.addresses, ["192.0.2.1"]);
        assert!(ok.error.is_empty());

        let failed = &result.lookups[1];
        assert!(!failed.is_resolved());
        assert!(failed.addresses.is_empty());
        assert!(failed.error.contains("b.invalid"));
    }

    #[tokio::test]
    async fn test_lookup_with_no_addresses_counts_as_failure() {
        let resolver = TableResolver::new(&[("empty.example", &[])]);
        let publisher = Arc::new(RecordingPublisher::default());
        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            task_config(&["empty.example"], &[]),
            publisher,
            resolver,
        );

        let result = task.run_cycle().await;
        let lookup = &result.lookups[0];
        assert!(!lookup.is_resolved());
        assert!(lookup.addresses.is_empty());
        assert!(!lookup.error.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sleeps_after_work() {
        let resolver = TableResolver::new(&[("a.example", &["192.0.2.1"])]);
        let publisher = Arc::new(RecordingPublisher::default());
        let interval = Duration::from_secs(60);

        let mut config = task_config(&["a.example"], &[]);
        config.interval = interval;

        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            config,
            Arc::clone(&publisher),
            resolver,
        );
        let handle = tokio::spawn(task.run());

        // Cycles land at t=0, t=60s, t=120s.
        tokio::time::sleep(interval * 2 + Duration::from_millis(1)).await;
        handle.abort();

        assert_eq!(publisher.publish_count(), 3);

        let instants = publisher.instants.lock().unwrap();
        for pair in instants.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_does_not_stop_next_cycle() {
        let resolver = TableResolver::new(&[("a.example", &["192.0.2.1"])]);
        let publisher = Arc::new(RecordingPublisher::failing());
        let interval = Duration::from_secs(60);

        let mut config = task_config(&["a.example"], &[]);
        config.interval = interval;

        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            config,
            Arc::clone(&publisher),
            resolver,
        );
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(interval + Duration::from_millis(1)).await;
        handle.abort();

        // Both cycles attempted their publish despite the failures.
        assert_eq!(publisher.publish_count(), 2);
    }

    #[tokio::test]
    async fn test_published_payload_matches_worked_example() {
        let resolver = TableResolver::new(&[("a.example", &["192.0.2.1"])]);
        let publisher = Arc::new(RecordingPublisher::default());
        let task = DnsCheckTask::new(
            "node-1",
            "org.example.monitoring.dns",
            task_config(&["a.example", "b.invalid"], &[]),
            Arc::clone(&publisher),
            resolver,
        );

        let result = task.run_cycle().await;
        task.publisher
            .publish_json(&task.subject, &result)
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);

        let (subject, payload) = &published[0];
        assert_eq!(subject, "org.example.monitoring.dns");
        assert_eq!(payload["node"], "node-1");
        assert_eq!(payload["lookups"][0]["type"], "EXTERNAL_LOOKUP");
        assert_eq!(payload["lookups"][0]["addresses"][0], "192.0.2.1");
        assert_eq!(payload["lookups"][1]["type"], "EXTERNAL_LOOKUP");
        assert_eq!(payload["lookups"][1]["addresses"], serde_json::json!([]));
        assert!(!payload["lookups"][1]["error"].as_str().unwrap().is_empty());
        assert!(payload["dateSent"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_system_resolver_handles_localhost() {
        let resolver = SystemResolver;
        let addrs = resolver.resolve("localhost").await.unwrap();
        assert!(!addrs.is_empty());
    }
}
