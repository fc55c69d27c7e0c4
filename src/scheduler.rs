//! Scheduler
//!
//! Launches the ping responder and the periodic check tasks as
//! independent tokio tasks sharing the bus connection and node identity.
//! Beyond starting and stopping them it performs no coordination: no
//! task waits on, or reads state from, another.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::{BusError, NatsConnector};
use crate::checks::dns::{DnsCheckTask, SystemResolver, DNS_SUBJECT};
use crate::config::{DnsCheckConfig, HeartbeatConfig};
use crate::heartbeat::task::{HeartbeatTask, HEARTBEAT_SUBJECT};
use crate::ping;

/// Handles to the agent's long-lived tasks.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Subscribe the ping responder, then spawn the DNS-check and
    /// heartbeat loops with their own configuration snapshots.
    pub async fn start(
        connector: Arc<NatsConnector>,
        node: String,
        dns_config: DnsCheckConfig,
        heartbeat_config: HeartbeatConfig,
    ) -> Result<Self, BusError> {
        let mut handles = Vec::with_capacity(3);

        handles.push(ping::start(Arc::clone(&connector)).await?);

        let dns_task = DnsCheckTask::new(
            node.clone(),
            connector.subject(DNS_SUBJECT),
            dns_config.clone(),
            Arc::clone(&connector),
            SystemResolver,
        );
        info!(
            "starting DNS checks every {:?} ({} external, {} internal hostnames)",
            dns_config.interval,
            dns_config.external_hostnames.len(),
            dns_config.internal_hostnames.len(),
        );
        handles.push(tokio::spawn(dns_task.run()));

        let heartbeat_task = HeartbeatTask::new(
            node,
            connector.subject(HEARTBEAT_SUBJECT),
            heartbeat_config.clone(),
            connector,
        );
        info!("starting heartbeat every {:?}", heartbeat_config.interval);
        handles.push(tokio::spawn(heartbeat_task.run()));

        Ok(Self { handles })
    }

    /// Abort every task. The loops hold no state worth draining, so an
    /// abort at a sleep or publish boundary is a clean stop.
    pub fn stop(&mut self) {
        debug!("stopping {} scheduler tasks", self.handles.len());
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}
