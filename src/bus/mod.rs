//! Message Bus
//!
//! The shared NATS connection: connect options, subject/queue
//! namespacing, and the publish seam used by the check tasks.

pub mod connector;

pub use connector::{
    BusError, ConnectorSettings, NatsConnector, Publisher, DEFAULT_SEND_TIMEOUT,
};
