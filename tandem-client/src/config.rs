use crate::media::MediaConstraints;
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_core::utils::DEFAULT_AUTOSAVE_INTERVAL_MS;

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:5001";
pub const DEFAULT_STORE_URL: &str = "http://localhost:5001/api";

/// Top-level configuration of a collaboration client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub relay_url: String,
    pub store_url: String,
    #[serde(with = "duration_ms")]
    pub handshake_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub document: DocumentConfig,
    pub mesh: MeshConfig,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            store_url: DEFAULT_STORE_URL.to_owned(),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            document: DocumentConfig::default(),
            mesh: MeshConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, with `TANDEM_RELAY_URL` and `TANDEM_STORE_URL` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TANDEM_RELAY_URL") {
            config.relay_url = url;
        }
        if let Ok(url) = std::env::var("TANDEM_STORE_URL") {
            config.store_url = url;
        }
        config
    }
}

/// Exponential backoff used by the session channel after a transport drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnection attempt `attempt` (1-based), or `None` once
    /// the attempts are exhausted. 1s, 2s, 4s, ... capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    #[serde(with = "duration_ms")]
    pub autosave_interval: Duration,
    /// How long the "saving" flag stays up after a snapshot is sent.
    #[serde(with = "duration_ms")]
    pub saving_indicator: Duration,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_millis(DEFAULT_AUTOSAVE_INTERVAL_MS),
            saving_indicator: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Send `leave-video` on leave and honour `user-left`. Off by default:
    /// peers then notice a departure only through the transport timeout.
    pub announce_leave: bool,
    pub constraints: MediaConstraints,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
