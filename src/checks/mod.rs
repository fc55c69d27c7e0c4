//! Health Checks
//!
//! Periodic checks the agent runs against its node. Currently this is
//! the DNS-resolution check; each check owns its own loop and publishes
//! its results independently.

pub mod dns;

pub use dns::{DnsCheckTask, Resolver, SystemResolver, DNS_SUBJECT};
