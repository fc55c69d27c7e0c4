//! Monitoring Agent - Type Definitions
//!
//! The record types published on the message bus. All records are
//! ephemeral: built fresh each cycle, handed to the publisher, and
//! discarded.

use chrono::Utc;
use serde::{Deserialize, Serialize};

// ─── DNS Checks ──────────────────────────────────────────────────

/// Which hostname group a lookup belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LookupDirection {
    #[serde(rename = "INTERNAL_LOOKUP")]
    Internal,
    #[serde(rename = "EXTERNAL_LOOKUP")]
    External,
}

/// One hostname resolution attempt.
///
/// A lookup is either resolved (non-empty `addresses`, empty `error`) or
/// failed (empty `addresses`, non-empty `error`); build one through
/// `resolved` or `failed` so no record carries both.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsLookup {
    pub host: String,
    pub addresses: Vec<String>,
    #[serde(rename = "type")]
    pub direction: LookupDirection,
    pub error: String,
}

impl DnsLookup {
    /// A lookup that succeeded with the given addresses.
    pub fn resolved(
        host: impl Into<String>,
        direction: LookupDirection,
        addresses: Vec<String>,
    ) -> Self {
        Self {
            host: host.into(),
            addresses,
            direction,
            error: String::new(),
        }
    }

    /// A lookup that failed with the given reason.
    pub fn failed(
        host: impl Into<String>,
        direction: LookupDirection,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            addresses: Vec::new(),
            direction,
            error: reason.into(),
        }
    }

    /// Whether this lookup resolved successfully.
    pub fn is_resolved(&self) -> bool {
        self.error.is_empty()
    }
}

/// Aggregate of all lookups from one DNS-check cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsCheckResult {
    pub node: String,
    pub lookups: Vec<DnsLookup>,
    pub date_sent: String,
}

impl DnsCheckResult {
    /// Assemble a result record, stamping it with the current time.
    pub fn new(node: impl Into<String>, lookups: Vec<DnsLookup>) -> Self {
        Self {
            node: node.into(),
            lookups,
            date_sent: Utc::now().to_rfc3339(),
        }
    }
}

// ─── Heartbeat ───────────────────────────────────────────────────

/// One liveness heartbeat.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub node: String,
    pub date_sent: String,
}

impl Heartbeat {
    /// Assemble a heartbeat record, stamping it with the current time.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            date_sent: Utc::now().to_rfc3339(),
        }
    }
}
