//! NATS Connector
//!
//! Wraps the shared `async_nats::Client` together with the agent's
//! subject and queue namespace. The client is internally synchronized
//! and cheap to clone, so every task can publish through the same
//! connector without caller-side locking.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on a single publish (including flush). A send that takes
/// longer surfaces as `BusError::Timeout` instead of hanging the caller.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by the bus connector.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("failed to read NATS credentials: {0}")]
    Credentials(#[from] std::io::Error),

    #[error("failed to encode message for {subject}: {source}")]
    Encode {
        subject: String,
        source: serde_json::Error,
    },

    #[error("failed to publish to {subject}: {source}")]
    Publish {
        subject: String,
        source: async_nats::PublishError,
    },

    #[error("failed to flush publish to {subject}: {source}")]
    Flush {
        subject: String,
        source: async_nats::client::FlushError,
    },

    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe {
        subject: String,
        source: async_nats::SubscribeError,
    },

    #[error("publish to {subject} timed out after {timeout:?}")]
    Timeout { subject: String, timeout: Duration },
}

/// Settings for establishing the shared NATS connection.
#[derive(Clone, Debug)]
pub struct ConnectorSettings {
    /// Comma-separated NATS server URLs.
    pub urls: String,
    pub creds_path: String,
    pub tls_cert_path: String,
    pub tls_key_path: String,
    pub ca_cert_path: String,
    pub base_subject: String,
    pub base_queue: String,
    pub max_reconnects: usize,
    pub reconnect_wait: Duration,
    pub send_timeout: Duration,
}

/// Send one structured record to a named subject on the bus.
///
/// Implementations must be safe to call concurrently from independent
/// tasks; the trait exists so cycle logic can be exercised against an
/// in-memory publisher in tests.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_json<T>(&self, subject: &str, message: &T) -> Result<(), BusError>
    where
        T: Serialize + Sync;
}

/// The shared bus connection plus the agent's subject/queue namespace.
pub struct NatsConnector {
    client: async_nats::Client,
    base_subject: String,
    base_queue: String,
    send_timeout: Duration,
}

impl NatsConnector {
    /// Establish the NATS connection with TLS client auth and a
    /// credentials file, per the connector settings.
    pub async fn connect(settings: &ConnectorSettings) -> Result<Self, BusError> {
        let reconnect_wait = settings.reconnect_wait;

        let options = async_nats::ConnectOptions::new()
            .require_tls(true)
            .add_root_certificates(PathBuf::from(&settings.ca_cert_path))
            .add_client_certificate(
                PathBuf::from(&settings.tls_cert_path),
                PathBuf::from(&settings.tls_key_path),
            )
            .credentials_file(&settings.creds_path)
            .await?
            .max_reconnects(settings.max_reconnects)
            .reconnect_delay_callback(move |_attempts| reconnect_wait);

        let client = options.connect(settings.urls.as_str()).await?;
        info!("connected to NATS at {}", settings.urls);

        Ok(Self {
            client,
            base_subject: settings.base_subject.clone(),
            base_queue: settings.base_queue.clone(),
            send_timeout: settings.send_timeout,
        })
    }

    /// The full subject for `name` under this agent's namespace.
    pub fn subject(&self, name: &str) -> String {
        namespaced(&self.base_subject, name)
    }

    /// The full queue group for `name` under this agent's namespace.
    pub fn queue(&self, name: &str) -> String {
        namespaced(&self.base_queue, name)
    }

    /// Subscribe to the namespaced subject for `name` on the shared
    /// queue group. Returns the subscriber along with the derived
    /// subject and queue names for logging.
    pub async fn queue_subscribe(
        &self,
        name: &str,
    ) -> Result<(async_nats::Subscriber, String, String), BusError> {
        let subject = self.subject(name);
        let queue = self.queue(name);

        let subscriber = self
            .client
            .queue_subscribe(subject.clone(), queue.clone())
            .await
            .map_err(|source| BusError::Subscribe {
                subject: subject.clone(),
                source,
            })?;

        Ok((subscriber, subject, queue))
    }

    /// Reply to a request message, bounded by the send timeout.
    pub async fn respond(
        &self,
        reply: async_nats::Subject,
        payload: &[u8],
    ) -> Result<(), BusError> {
        self.send(reply.to_string(), payload.to_vec()).await
    }

    async fn send(&self, subject: String, payload: Vec<u8>) -> Result<(), BusError> {
        let outcome = tokio::time::timeout(self.send_timeout, async {
            self.client
                .publish(subject.clone(), payload.into())
                .await
                .map_err(|source| BusError::Publish {
                    subject: subject.clone(),
                    source,
                })?;
            // Flush so transport failures surface on this call.
            self.client
                .flush()
                .await
                .map_err(|source| BusError::Flush {
                    subject: subject.clone(),
                    source,
                })
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout {
                subject,
                timeout: self.send_timeout,
            }),
        }
    }
}

#[async_trait]
impl Publisher for NatsConnector {
    async fn publish_json<T>(&self, subject: &str, message: &T) -> Result<(), BusError>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_vec(message).map_err(|source| BusError::Encode {
            subject: subject.to_string(),
            source,
        })?;

        debug!("publishing {} bytes to {}", payload.len(), subject);
        self.send(subject.to_string(), payload).await
    }
}

fn namespaced(base: &str, name: &str) -> String {
    format!("{}.{}", base, name)
}
