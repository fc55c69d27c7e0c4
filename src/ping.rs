//! Ping Responder
//!
//! Answers synchronous liveness probes from other components. The
//! subscription uses the shared queue group, so in a horizontally-scaled
//! fleet only one agent answers any single request.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bus::{BusError, NatsConnector};

/// Endpoint name (relative to the agent's namespace) the responder
/// listens on.
pub const PING_ENDPOINT: &str = "ping";

/// The reply sent for every ping request, whatever its payload.
pub const PONG_PAYLOAD: &[u8] = b"pong";

/// Subscribe to the ping endpoint and spawn the reply loop.
///
/// Reply failures are logged and swallowed; nothing that happens while
/// answering one request stops the responder from answering the next.
pub async fn start(connector: Arc<NatsConnector>) -> Result<JoinHandle<()>, BusError> {
    let (mut subscriber, subject, queue) = connector.queue_subscribe(PING_ENDPOINT).await?;
    info!("subscribed to {} on queue {}", subject, queue);

    let handle = tokio::spawn(async move {
        while let Some(message) = subscriber.next().await {
            info!("ping message received");

            let Some(reply) = message.reply else {
                warn!("ping request carried no reply subject, dropping it");
                continue;
            };

            if let Err(e) = connector.respond(reply, PONG_PAYLOAD).await {
                error!("failed to reply to ping: {}", e);
            }
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_payload_is_pong() {
        assert_eq!(PONG_PAYLOAD, b"pong");
    }
}
