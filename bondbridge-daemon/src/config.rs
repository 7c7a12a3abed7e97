use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
    pub bluetooth: BluetoothConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// BlueZ adapter name, e.g. `hci0`
    pub adapter: String,
    /// How long to wait on `Pair` before treating the request as submitted
    pub pair_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Report adapter faults as `BOND_FAILED` errors instead of `false`
    pub surface_adapter_faults: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/bondbridge/bondbridge.sock".to_string(),
            bluetooth: BluetoothConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: "hci0".to_string(),
            pair_timeout_ms: 5000,
        }
    }
}

impl BluetoothConfig {
    pub fn pair_timeout(&self) -> Duration {
        Duration::from_millis(self.pair_timeout_ms)
    }
}

impl DaemonConfig {
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Create default config if not found
                let config = Self::default();
                if let Err(e) = fs::write(path, toml::to_string_pretty(&config)?) {
                    tracing::debug!("Could not write default config to {}: {}", path, e);
                }
                Ok(config)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [channel]
            surface_adapter_faults = true
            "#,
        )
        .unwrap();

        assert!(config.channel.surface_adapter_faults);
        assert_eq!(config.socket_path, "/run/bondbridge/bondbridge.sock");
        assert_eq!(config.bluetooth.adapter, "hci0");
        assert_eq!(config.bluetooth.pair_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bondbridged.toml");
        let path = path.to_str().unwrap();

        let config = DaemonConfig::load(path).unwrap();
        assert!(!config.channel.surface_adapter_faults);

        let written: DaemonConfig = toml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.socket_path, config.socket_path);
        assert_eq!(written.bluetooth.pair_timeout_ms, 5000);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bondbridged.toml");
        fs::write(&path, "bluetooth = 3").unwrap();

        assert!(DaemonConfig::load(path.to_str().unwrap()).is_err());
    }
}
