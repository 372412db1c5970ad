//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration that drives a `meshlink` session.
//! Every section and field has a default, so a partial (or empty) file is
//! valid; values are clamped into sane ranges when converted into the
//! runtime [`SessionTunings`] consumed by the session engine.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("meshlink.toml").await?;
//!     let config = Config::load("meshlink.toml").await?;
//!     println!("Serial Port: {}", config.transport.port);
//!     let tunings = config.tunings();
//!     println!("Watchdog: {:?}", tunings.handshake_watchdog);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [session]
//! auto_reconnect = true
//! connect_timeout_ms = 1500
//! connect_max_attempts = 10
//! handshake_watchdog_secs = 10
//! handshake_max_retries = 3
//! minimum_firmware_version = "2.3.15"
//!
//! [location]
//! provide_location = false
//! position_interval_secs = 900
//!
//! [interest]
//! store_forward_history = false
//! mqtt_proxy = false
//!
//! [transport]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::session::{InterestFlags, SessionTunings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub interest: InterestConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection supervisor and handshake tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_reconnect: bool,
    /// Device identity to reconnect to automatically when rediscovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_device: Option<String>,
    pub connect_timeout_ms: u64,
    pub connect_max_attempts: u32,
    pub handshake_watchdog_secs: u64,
    pub handshake_max_retries: u32,
    pub minimum_firmware_version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            preferred_device: None,
            connect_timeout_ms: 1500,
            connect_max_attempts: 10,
            handshake_watchdog_secs: 10,
            handshake_max_retries: 3,
            minimum_firmware_version: crate::session::MINIMUM_FIRMWARE_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Periodically send our own position to the mesh once subscribed.
    pub provide_location: bool,
    pub position_interval_secs: u64,
    /// Fixed position reported when `provide_location` is on (degrees).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i32>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provide_location: false,
            position_interval_secs: 900,
            latitude: None,
            longitude: None,
            altitude: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_secs: u64,
    pub node_max_age_days: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            node_max_age_days: 7,
        }
    }
}

/// Optional packet classes we ask the radio (or its routers) for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    pub store_forward_history: bool,
    pub mqtt_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot of the mesh repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,
    /// How often saved changes are written to the snapshot.
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: Some("./data/mesh.json".to_string()),
            flush_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("meshlink.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Runtime tunings for the session engine. Zero intervals and ceilings are
    /// clamped to 1 so no timer can spin.
    pub fn tunings(&self) -> SessionTunings {
        let s = &self.session;
        let fixed_position = match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon, self.location.altitude)),
            _ => None,
        };
        SessionTunings {
            auto_reconnect: s.auto_reconnect,
            preferred_device: s.preferred_device.clone().filter(|d| !d.trim().is_empty()),
            connect_timeout: Duration::from_millis(s.connect_timeout_ms.max(1)),
            connect_max_attempts: s.connect_max_attempts.max(1),
            handshake_watchdog: Duration::from_secs(s.handshake_watchdog_secs.max(1)),
            handshake_max_retries: s.handshake_max_retries.max(1),
            minimum_firmware: s.minimum_firmware_version.clone(),
            provide_location: self.location.provide_location,
            position_interval: Duration::from_secs(self.location.position_interval_secs.max(1)),
            fixed_position,
            maintenance_interval: Duration::from_secs(self.maintenance.interval_secs.max(1)),
            node_max_age: Duration::from_secs(
                u64::from(self.maintenance.node_max_age_days.max(1)) * 24 * 3600,
            ),
            interest: InterestFlags {
                store_forward_history: self.interest.store_forward_history,
                mqtt_proxy: self.interest.mqtt_proxy,
            },
            ..SessionTunings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.session.auto_reconnect);
        assert_eq!(config.session.connect_max_attempts, 10);
        assert_eq!(config.session.minimum_firmware_version, "2.3.15");
        assert!(!config.location.provide_location);
        assert_eq!(config.maintenance.interval_secs, 600);
    }

    #[test]
    fn test_partial_section_fills_missing_fields() {
        let config: Config = toml::from_str(
            r#"
            [session]
            handshake_max_retries = 5

            [location]
            provide_location = true
            "#,
        )
        .unwrap();
        assert_eq!(config.session.handshake_max_retries, 5);
        assert_eq!(config.session.handshake_watchdog_secs, 10);
        assert!(config.location.provide_location);
        assert_eq!(config.location.position_interval_secs, 900);
    }

    #[test]
    fn test_tunings_clamp_zero_values() {
        let mut config = Config::default();
        config.session.connect_max_attempts = 0;
        config.session.handshake_watchdog_secs = 0;
        config.maintenance.interval_secs = 0;
        let t = config.tunings();
        assert_eq!(t.connect_max_attempts, 1);
        assert_eq!(t.handshake_watchdog, Duration::from_secs(1));
        assert_eq!(t.maintenance_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_tunings_defaults_match_protocol_constants() {
        let t = Config::default().tunings();
        assert_eq!(t.connect_timeout, Duration::from_millis(1500));
        assert_eq!(t.handshake_max_retries, 3);
        assert_eq!(t.node_max_age, Duration::from_secs(7 * 24 * 3600));
        assert!(t.fixed_position.is_none());
    }

    #[test]
    fn test_blank_preferred_device_is_ignored() {
        let mut config = Config::default();
        config.session.preferred_device = Some("  ".into());
        assert!(config.tunings().preferred_device.is_none());
    }

    #[tokio::test]
    async fn test_create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshlink.toml");
        let path = path.to_str().unwrap();
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.transport.baud_rate, 115200);
        assert_eq!(loaded.storage.flush_interval_secs, 5);
        assert_eq!(loaded.logging.level, "info");
    }
}
