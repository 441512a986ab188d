//! Gateway configuration.
//!
//! Values come from three layers, later layers winning: built-in defaults,
//! an optional TOML file, and `WAITINGROOM_`-prefixed environment
//! variables. Secrets (cookie seal keys, notifier webhook) are environment
//! only.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "WAITINGROOM_";

/// Runtime configuration for the gateway and the admission engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen address for the HTTP server.
    #[serde(default = "default_listener")]
    pub listener: String,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Interval at which the edge is expected to re-poll waiting clients.
    #[serde(default = "default_client_polling_interval_sec")]
    pub client_polling_interval_sec: u64,

    /// How long an admitted client keeps access; also the cookie lifetime.
    #[serde(default = "default_permitted_access_sec")]
    pub permitted_access_sec: u64,

    /// Grace window before a freshly identified client may take a ticket.
    ///
    /// Duplicate concurrent requests from one browser converge on a single
    /// cookie during this window, so only one ticket is consumed.
    #[serde(default = "default_entry_delay_sec")]
    pub entry_delay_sec: i64,

    /// Lifetime of an enabled domain's per-domain keys.
    #[serde(default = "default_queue_enable_sec")]
    pub queue_enable_sec: u64,

    /// Controller tick period; also the per-domain advance-lock TTL.
    #[serde(default = "default_permit_interval_sec")]
    pub permit_interval_sec: u64,

    /// Quantum added to the admission watermark per tick.
    #[serde(default = "default_permit_unit_number")]
    pub permit_unit_number: i64,

    /// Positive TTL for the local in-process cache.
    #[serde(default = "default_cache_ttl_sec")]
    pub cache_ttl_sec: u64,

    /// Negative TTL (known-absent entries) for the local cache.
    #[serde(default = "default_negative_cache_ttl_sec")]
    pub negative_cache_ttl_sec: u64,

    /// Slack incoming-webhook URL for operator notifications.
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    /// Slack channel posted to by the notifier.
    #[serde(default)]
    pub slack_channel: Option<String>,
}

fn default_listener() -> String {
    "127.0.0.1:18080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_client_polling_interval_sec() -> u64 {
    60
}

const fn default_permitted_access_sec() -> u64 {
    600
}

const fn default_entry_delay_sec() -> i64 {
    10
}

const fn default_queue_enable_sec() -> u64 {
    300
}

const fn default_permit_interval_sec() -> u64 {
    60
}

const fn default_permit_unit_number() -> i64 {
    1000
}

const fn default_cache_ttl_sec() -> u64 {
    20
}

const fn default_negative_cache_ttl_sec() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: default_listener(),
            log_level: default_log_level(),
            client_polling_interval_sec: default_client_polling_interval_sec(),
            permitted_access_sec: default_permitted_access_sec(),
            entry_delay_sec: default_entry_delay_sec(),
            queue_enable_sec: default_queue_enable_sec(),
            permit_interval_sec: default_permit_interval_sec(),
            permit_unit_number: default_permit_unit_number(),
            cache_ttl_sec: default_cache_ttl_sec(),
            negative_cache_ttl_sec: default_negative_cache_ttl_sec(),
            slack_webhook_url: None,
            slack_channel: None,
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file, then applies
    /// environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the file cannot be read or parsed, an
    /// environment override is malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("read {}: {e}", p.display())))?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("parse {}: {e}", p.display())))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WAITINGROOM_*` environment overrides in place.
    fn apply_env(&mut self) -> Result<()> {
        env_override_string("LISTENER", &mut self.listener);
        env_override_string("LOG_LEVEL", &mut self.log_level);
        env_override_u64(
            "CLIENT_POLLING_INTERVAL_SEC",
            &mut self.client_polling_interval_sec,
        )?;
        env_override_u64("PERMITTED_ACCESS_SEC", &mut self.permitted_access_sec)?;
        env_override_i64("ENTRY_DELAY_SEC", &mut self.entry_delay_sec)?;
        env_override_u64("QUEUE_ENABLE_SEC", &mut self.queue_enable_sec)?;
        env_override_u64("PERMIT_INTERVAL_SEC", &mut self.permit_interval_sec)?;
        env_override_i64("PERMIT_UNIT_NUMBER", &mut self.permit_unit_number)?;
        env_override_u64("CACHE_TTL_SEC", &mut self.cache_ttl_sec)?;
        env_override_u64("NEGATIVE_CACHE_TTL_SEC", &mut self.negative_cache_ttl_sec)?;
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}SLACK_WEBHOOK_URL")) {
            self.slack_webhook_url = Some(v);
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}SLACK_CHANNEL")) {
            self.slack_channel = Some(v);
        }
        Ok(())
    }

    /// Checks the cross-field constraints the admission protocol relies on.
    ///
    /// The permit interval bounds both cache TTLs: a local cache entry must
    /// not outlive the tick that would invalidate it, or handlers could
    /// serve watermarks staler than one full advancement cycle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.permit_unit_number <= 0 {
            return Err(Error::Config(format!(
                "permit_unit_number must be positive, got {}",
                self.permit_unit_number
            )));
        }
        if self.entry_delay_sec < 0 {
            return Err(Error::Config(format!(
                "entry_delay_sec must not be negative, got {}",
                self.entry_delay_sec
            )));
        }
        for (name, value) in [
            ("permitted_access_sec", self.permitted_access_sec),
            ("queue_enable_sec", self.queue_enable_sec),
            ("permit_interval_sec", self.permit_interval_sec),
            ("cache_ttl_sec", self.cache_ttl_sec),
            ("negative_cache_ttl_sec", self.negative_cache_ttl_sec),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        if self.permit_interval_sec < self.cache_ttl_sec {
            return Err(Error::Config(format!(
                "permit_interval_sec ({}) must be >= cache_ttl_sec ({})",
                self.permit_interval_sec, self.cache_ttl_sec
            )));
        }
        if self.permit_interval_sec < self.negative_cache_ttl_sec {
            return Err(Error::Config(format!(
                "permit_interval_sec ({}) must be >= negative_cache_ttl_sec ({})",
                self.permit_interval_sec, self.negative_cache_ttl_sec
            )));
        }
        Ok(())
    }

    /// TTL for client permits and the client cookie.
    #[must_use]
    pub const fn permitted_access(&self) -> Duration {
        Duration::from_secs(self.permitted_access_sec)
    }

    /// Lifetime of an enabled domain's per-domain keys.
    #[must_use]
    pub const fn queue_enable(&self) -> Duration {
        Duration::from_secs(self.queue_enable_sec)
    }

    /// Controller tick period and advance-lock TTL.
    #[must_use]
    pub const fn permit_interval(&self) -> Duration {
        Duration::from_secs(self.permit_interval_sec)
    }

    /// Positive local-cache TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }

    /// Negative local-cache TTL.
    #[must_use]
    pub const fn negative_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_cache_ttl_sec)
    }

    /// Throttle window for repeated enable calls: half the key lifetime.
    #[must_use]
    pub const fn enable_throttle(&self) -> Duration {
        Duration::from_secs(self.queue_enable_sec / 2)
    }
}

fn env_override_string(name: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(format!("{ENV_PREFIX}{name}")) {
        *slot = v;
    }
}

fn env_override_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Ok(v) = std::env::var(format!("{ENV_PREFIX}{name}")) {
        *slot = v
            .parse()
            .map_err(|e| Error::Config(format!("{ENV_PREFIX}{name}: {e}")))?;
    }
    Ok(())
}

fn env_override_i64(name: &str, slot: &mut i64) -> Result<()> {
    if let Ok(v) = std::env::var(format!("{ENV_PREFIX}{name}")) {
        *slot = v
            .parse()
            .map_err(|e| Error::Config(format!("{ENV_PREFIX}{name}: {e}")))?;
    }
    Ok(())
}
