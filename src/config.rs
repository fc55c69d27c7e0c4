//! Agent Configuration
//!
//! Loads the agent's configuration from a JSON file, applies
//! environment-variable overrides, and resolves the immutable per-task
//! snapshots handed to the check tasks at startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bus::{ConnectorSettings, DEFAULT_SEND_TIMEOUT};

/// Interval used for DNS checks when `dns.checkInterval` is unset.
pub const DEFAULT_DNS_CHECK_INTERVAL: &str = "1m";

/// Interval used for heartbeats when `heartbeat.interval` is unset.
pub const DEFAULT_HEARTBEAT_INTERVAL: &str = "10s";

// ─── Settings file ───────────────────────────────────────────────

/// Top-level agent configuration as read from the config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// The identity of the node this agent reports for.
    pub node: String,
    pub nats: NatsSettings,
    pub dns: DnsSettings,
    pub heartbeat: HeartbeatSettings,
}

/// Connection settings for the shared NATS bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatsSettings {
    /// Comma-separated NATS server URLs.
    pub urls: String,
    pub creds_path: String,
    pub tls_cert: String,
    pub tls_key: String,
    pub ca_cert: String,
    /// Namespace prefix for every subject the agent publishes or
    /// subscribes to.
    pub base_subject: String,
    /// Namespace prefix for the shared queue group.
    pub base_queue: String,
    pub max_reconnects: usize,
    /// Seconds to wait between reconnect attempts.
    pub reconnect_wait: u64,
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            urls: String::new(),
            creds_path: String::new(),
            tls_cert: String::new(),
            tls_key: String::new(),
            ca_cert: String::new(),
            base_subject: String::new(),
            base_queue: String::new(),
            max_reconnects: 10,
            reconnect_wait: 1,
        }
    }
}

/// DNS-check settings as written in the config file. Hostname lists are
/// comma-separated strings; the interval is a duration string like `1m`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsSettings {
    pub internal_hostnames: String,
    pub external_hostnames: String,
    pub check_interval: String,
}

/// Heartbeat settings as written in the config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatSettings {
    pub interval: String,
}

// ─── Per-task snapshots ──────────────────────────────────────────

/// Immutable configuration snapshot for the DNS-check task.
#[derive(Clone, Debug)]
pub struct DnsCheckConfig {
    pub interval: Duration,
    pub internal_hostnames: Vec<String>,
    pub external_hostnames: Vec<String>,
}

/// Immutable configuration snapshot for the heartbeat task.
#[derive(Clone, Debug)]
pub struct HeartbeatConfig {
    pub interval: Duration,
}

impl AgentConfig {
    /// Check that every required setting is present. The error messages
    /// name both the environment variable and the config file key so the
    /// operator can fix whichever source they use.
    pub fn validate(&self, env_prefix: &str) -> Result<()> {
        let required = [
            (&self.node, "NODE", "node"),
            (&self.nats.urls, "NATS_URLS", "nats.urls"),
            (&self.nats.creds_path, "NATS_CREDS_PATH", "nats.credsPath"),
            (&self.nats.tls_cert, "NATS_TLS_CERT", "nats.tlsCert"),
            (&self.nats.tls_key, "NATS_TLS_KEY", "nats.tlsKey"),
            (&self.nats.ca_cert, "NATS_CA_CERT", "nats.caCert"),
            (&self.nats.base_subject, "NATS_BASE_SUBJECT", "nats.baseSubject"),
            (&self.nats.base_queue, "NATS_BASE_QUEUE", "nats.baseQueue"),
        ];

        for (value, env_name, key) in required {
            if value.is_empty() {
                bail!(
                    "The {}{} environment variable or the {} configuration value must be set",
                    env_prefix,
                    env_name,
                    key
                );
            }
        }

        Ok(())
    }

    /// Resolve the DNS-check task snapshot, falling back to the default
    /// interval when the setting is absent.
    pub fn dns_check_config(&self) -> Result<DnsCheckConfig> {
        let setting = if self.dns.check_interval.is_empty() {
            DEFAULT_DNS_CHECK_INTERVAL
        } else {
            &self.dns.check_interval
        };

        let interval = parse_duration(setting)
            .with_context(|| format!("invalid dns.checkInterval '{}'", setting))?;
        if interval.is_zero() {
            bail!("dns.checkInterval must be a positive duration");
        }

        Ok(DnsCheckConfig {
            interval,
            internal_hostnames: split_hostnames(&self.dns.internal_hostnames),
            external_hostnames: split_hostnames(&self.dns.external_hostnames),
        })
    }

    /// Resolve the heartbeat task snapshot, falling back to the default
    /// interval when the setting is absent.
    pub fn heartbeat_config(&self) -> Result<HeartbeatConfig> {
        let setting = if self.heartbeat.interval.is_empty() {
            DEFAULT_HEARTBEAT_INTERVAL
        } else {
            &self.heartbeat.interval
        };

        let interval = parse_duration(setting)
            .with_context(|| format!("invalid heartbeat.interval '{}'", setting))?;
        if interval.is_zero() {
            bail!("heartbeat.interval must be a positive duration");
        }

        Ok(HeartbeatConfig { interval })
    }

    /// Build the connector settings, resolving tilde paths in the
    /// credential and TLS file locations.
    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            urls: self.nats.urls.clone(),
            creds_path: resolve_path(&self.nats.creds_path),
            tls_cert_path: resolve_path(&self.nats.tls_cert),
            tls_key_path: resolve_path(&self.nats.tls_key),
            ca_cert_path: resolve_path(&self.nats.ca_cert),
            base_subject: self.nats.base_subject.clone(),
            base_queue: self.nats.base_queue.clone(),
            max_reconnects: self.nats.max_reconnects,
            reconnect_wait: Duration::from_secs(self.nats.reconnect_wait),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────

/// Load the agent config from a JSON file.
///
/// A missing file is not an error: the agent can be configured entirely
/// through environment variables, so this falls back to defaults and
/// lets validation catch anything still unset.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        info!("no config file at {}, starting from defaults", path.display());
        return Ok(AgentConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let config: AgentConfig = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config from {}", path.display()))?;

    Ok(config)
}

/// Apply environment-variable overrides on top of the file settings.
///
/// Every config key has an environment counterpart named by upper-casing
/// its path under the given prefix, e.g. `dns.checkInterval` becomes
/// `<PREFIX>DNS_CHECK_INTERVAL`. Empty variables are ignored.
pub fn apply_env_overrides(config: &mut AgentConfig, prefix: &str) {
    let string_overrides: [(&str, &mut String); 12] = [
        ("NODE", &mut config.node),
        ("NATS_URLS", &mut config.nats.urls),
        ("NATS_CREDS_PATH", &mut config.nats.creds_path),
        ("NATS_TLS_CERT", &mut config.nats.tls_cert),
        ("NATS_TLS_KEY", &mut config.nats.tls_key),
        ("NATS_CA_CERT", &mut config.nats.ca_cert),
        ("NATS_BASE_SUBJECT", &mut config.nats.base_subject),
        ("NATS_BASE_QUEUE", &mut config.nats.base_queue),
        ("DNS_INTERNAL_HOSTNAMES", &mut config.dns.internal_hostnames),
        ("DNS_EXTERNAL_HOSTNAMES", &mut config.dns.external_hostnames),
        ("DNS_CHECK_INTERVAL", &mut config.dns.check_interval),
        ("HEARTBEAT_INTERVAL", &mut config.heartbeat.interval),
    ];

    for (name, slot) in string_overrides {
        if let Some(value) = env_value(prefix, name) {
            *slot = value;
        }
    }

    if let Some(value) = env_value(prefix, "NATS_MAX_RECONNECTS") {
        match value.parse() {
            Ok(n) => config.nats.max_reconnects = n,
            Err(_) => warn!(
                "ignoring non-numeric {}NATS_MAX_RECONNECTS value '{}'",
                prefix, value
            ),
        }
    }

    if let Some(value) = env_value(prefix, "NATS_RECONNECT_WAIT") {
        match value.parse() {
            Ok(n) => config.nats.reconnect_wait = n,
            Err(_) => warn!(
                "ignoring non-numeric {}NATS_RECONNECT_WAIT value '{}'",
                prefix, value
            ),
        }
    }
}

fn env_value(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}{}", prefix, name))
        .ok()
        .filter(|v| !v.is_empty())
}

// ─── Parsing helpers ─────────────────────────────────────────────

/// Parse a duration string made of integer value/unit segments, such as
/// `10s`, `1m`, `500ms`, or `1h30m`. Supported units are `ms`, `s`, `m`,
/// and `h`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let bytes = s.as_bytes();
    let mut total = Duration::ZERO;
    let mut i = 0;

    while i < bytes.len() {
        let number_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == number_start {
            bail!("invalid duration '{}': expected a number", s);
        }
        let value: u64 = s[number_start..i]
            .parse()
            .with_context(|| format!("invalid duration '{}'", s))?;

        let unit_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_digit() {
            i += 1;
        }
        total += match &s[unit_start..i] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            "" => bail!("invalid duration '{}': missing unit", s),
            unit => bail!("invalid duration '{}': unknown unit '{}'", s, unit),
        };
    }

    Ok(total)
}

/// Split a comma-separated hostname list, trimming whitespace from each
/// entry and dropping entries that are empty after trimming. Order and
/// duplicates are preserved.
pub fn split_hostnames(setting: &str) -> Vec<String> {
    setting
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect()
}

/// Resolve a path that may start with `~` to an absolute path.
///
/// If the path starts with `~`, the tilde is replaced with the user's
/// home directory. Otherwise the path is returned as-is.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}
