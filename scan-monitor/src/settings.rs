//! Monitor settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use scan_driver::config::{DEFAULT_BAUD_RATE, DEFAULT_PORT_ID, DEFAULT_TIMEOUT_MS};
use scan_driver::ChannelConfig;
use scan_protocol::{FramingMode, SymbologyStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings read from `settings.json`
///
/// Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Serial port the scanner is attached to
    pub port_id: String,
    /// Baud rate, checked when the channel config is built
    pub baud_rate: i64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub framing: FramingMode,
    pub symbology: SymbologyStrategy,
    /// List serial ports before opening the scanner
    pub list_ports_on_startup: bool,
    /// Events buffered between the driver and the console
    pub event_buffer: usize,
    /// Print raw frame bytes next to each label
    pub show_hex: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port_id: DEFAULT_PORT_ID.to_string(),
            baud_rate: DEFAULT_BAUD_RATE as i64,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            framing: FramingMode::default(),
            symbology: SymbologyStrategy::default(),
            list_ports_on_startup: true,
            event_buffer: 256,
            show_hex: false,
        }
    }
}

impl Settings {
    /// $XDG_CONFIG_HOME/scan-monitor, or ~/.config/scan-monitor
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("scan-monitor"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("scan-monitor"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location
    ///
    /// A missing file gives the defaults. So does an unreadable one, with a warning.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("Ignoring settings file: {:#}", e);
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write these settings to the default location
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Validated driver configuration
    pub fn channel_config(&self) -> scan_driver::Result<ChannelConfig> {
        let config = ChannelConfig::from_parts(
            self.port_id.clone(),
            self.baud_rate,
            self.read_timeout_ms,
            self.write_timeout_ms,
        )?
        .with_framing(self.framing)
        .with_symbology(self.symbology);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_driver::DriverError;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port_id, "COM10");
        assert_eq!(settings.baud_rate, 9600);

        let config = settings.channel_config().unwrap();
        assert_eq!(config, ChannelConfig::default());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"port_id": "/dev/ttyACM0", "show_hex": true}"#).unwrap();
        assert_eq!(settings.port_id, "/dev/ttyACM0");
        assert!(settings.show_hex);
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.framing, FramingMode::PerNotification);
    }

    #[test]
    fn test_framing_from_json() {
        let settings: Settings = serde_json::from_str(
            r#"{"framing": {"type": "delimited", "terminator": 10, "max_frame_len": 64}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.framing,
            FramingMode::Delimited {
                terminator: b'\n',
                max_frame_len: 64
            }
        );
    }

    #[test]
    fn test_bad_baud_rejected() {
        let settings = Settings {
            baud_rate: -1,
            ..Default::default()
        };
        assert!(matches!(
            settings.channel_config(),
            Err(DriverError::Configuration(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("scan-monitor-test-{}", std::process::id()));
        let path = dir.join("settings.json");

        let settings = Settings {
            port_id: "COM5".to_string(),
            baud_rate: 19200,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_from_invalid_json() {
        let dir = std::env::temp_dir().join(format!("scan-monitor-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(Settings::load_from(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
