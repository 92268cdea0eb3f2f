//! Daemon configuration.
//!
//! One JSON document, read once at startup. Missing fields take the defaults
//! below, so a partial file only needs to name what it changes.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mode::{SettingKey, SettingRange, SettingValues};
use crate::policy::{Timeouts, percent_to_contrast};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dialctl/config.json";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Encoder lines and sampling.
    pub encoder: EncoderConfig,
    /// Push-button timing.
    pub button: ButtonConfig,
    /// Display brightness and inactivity timeouts.
    pub display: DisplayConfig,
    /// Media player connection.
    pub player: PlayerConfig,
    /// Bounds of the editable settings.
    pub settings: SettingsConfig,
    /// Where the interaction state is persisted, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

/// Encoder GPIO lines and sampling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Whether to use the encoder at all.
    pub enabled: bool,
    /// GPIO chip name under `/dev`.
    pub chip: String,
    /// Line offset of encoder output A.
    pub pin_a: u32,
    /// Line offset of encoder output B.
    pub pin_b: u32,
    /// Line offset of the push button.
    pub pin_sw: u32,
    /// Swap the rotation direction.
    pub invert: bool,
    /// Minimum spacing between accepted edges on one line.
    pub debounce_ms: u64,
    /// Sampling period.
    pub poll_interval_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chip: "gpiochip0".to_string(),
            pin_a: 23,
            pin_b: 24,
            pin_sw: 13,
            invert: false,
            debounce_ms: 2,
            poll_interval_ms: 2,
        }
    }
}

impl EncoderConfig {
    /// Edge debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Sampling period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Push-button timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Hold time at which a press counts as long.
    pub long_press_ms: u64,
    /// Window after a classified press in which a short press is ignored.
    pub short_debounce_ms: u64,
    /// Window after the press edge in which a release counts as bounce.
    pub press_debounce_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 800,
            short_debounce_ms: 200,
            press_debounce_ms: 30,
        }
    }
}

impl ButtonConfig {
    /// Long-press threshold.
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    /// Short-press repeat suppression window.
    pub fn short_debounce(&self) -> Duration {
        Duration::from_millis(self.short_debounce_ms)
    }

    /// Press-edge bounce window.
    pub fn press_debounce(&self) -> Duration {
        Duration::from_millis(self.press_debounce_ms)
    }
}

/// Display brightness and inactivity timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Whether a display is attached.
    pub enabled: bool,
    /// Brightness while active, percent.
    pub brightness_active: u32,
    /// Brightness while dimmed, percent.
    pub brightness_dim: u32,
    /// Seconds of inactivity before dimming.
    pub dim_timeout_s: u32,
    /// Seconds of inactivity before turning off.
    pub off_timeout_s: u32,
    /// Display refresh period.
    pub refresh_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            brightness_active: 50,
            brightness_dim: 10,
            dim_timeout_s: 10,
            off_timeout_s: 30,
            refresh_interval_ms: 250,
        }
    }
}

impl DisplayConfig {
    /// Display refresh period.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Timeouts and contrast levels for the display policy.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            dim: Duration::from_secs(u64::from(self.dim_timeout_s)),
            off: Duration::from_secs(u64::from(self.off_timeout_s)),
            active_contrast: percent_to_contrast(self.brightness_active),
            dim_contrast: percent_to_contrast(self.brightness_dim),
        }
    }
}

/// Which media player backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// The `mpc` command-line client.
    #[default]
    Mpc,
    /// No player; commands are accepted and discarded.
    #[serde(rename = "none")]
    Disabled,
}

/// Media player connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Backend kind.
    pub kind: PlayerKind,
    /// MPD host.
    pub host: String,
    /// MPD port.
    pub port: u16,
    /// Time budget for one player command.
    pub timeout_ms: u64,
    /// Playlist loaded by the "Play radio" menu item.
    pub radio_playlist: String,
    /// Volume change per encoder step.
    pub volume_step: u8,
    /// Volume assumed when it cannot be read back at startup.
    pub initial_volume: u8,
    /// Period of the now-playing status query.
    pub status_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            kind: PlayerKind::Mpc,
            host: "localhost".to_string(),
            port: 6600,
            timeout_ms: 2000,
            radio_playlist: "radio".to_string(),
            volume_step: 2,
            initial_volume: 30,
            status_interval_ms: 1000,
        }
    }
}

impl PlayerConfig {
    /// Time budget for one player command.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Period of the now-playing status query.
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

/// Bounds of each editable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Active brightness bounds.
    pub brightness_active: SettingRange,
    /// Dimmed brightness bounds.
    pub brightness_dim: SettingRange,
    /// Off timeout bounds.
    pub off_timeout_s: SettingRange,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            brightness_active: SettingRange::new(1, 0, 100),
            brightness_dim: SettingRange::new(1, 0, 100),
            off_timeout_s: SettingRange::new(5, 10, 120),
        }
    }
}

impl SettingsConfig {
    /// Bounds of one setting.
    pub fn range(&self, key: SettingKey) -> SettingRange {
        match key {
            SettingKey::BrightnessActive => self.brightness_active,
            SettingKey::BrightnessDim => self.brightness_dim,
            SettingKey::OffTimeout => self.off_timeout_s,
        }
    }
}

impl Config {
    /// Read and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path`, replacing it atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        write_atomic(path, text.as_bytes()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |field: &'static str, reason: String| Err(ConfigError::Invalid { field, reason });

        let display = &self.display;
        if display.dim_timeout_s > display.off_timeout_s {
            return invalid(
                "display.dim_timeout_s",
                format!(
                    "{} exceeds off_timeout_s {}",
                    display.dim_timeout_s, display.off_timeout_s
                ),
            );
        }
        if display.brightness_active > 100 {
            return invalid(
                "display.brightness_active",
                format!("{} is above 100", display.brightness_active),
            );
        }
        if display.brightness_dim > 100 {
            return invalid(
                "display.brightness_dim",
                format!("{} is above 100", display.brightness_dim),
            );
        }
        if display.refresh_interval_ms == 0 {
            return invalid("display.refresh_interval_ms", "must be positive".to_string());
        }
        if self.button.long_press_ms == 0 {
            return invalid("button.long_press_ms", "must be positive".to_string());
        }
        if self.button.press_debounce_ms >= self.button.long_press_ms {
            return invalid(
                "button.press_debounce_ms",
                format!(
                    "{} must be below long_press_ms {}",
                    self.button.press_debounce_ms, self.button.long_press_ms
                ),
            );
        }
        if self.encoder.poll_interval_ms == 0 {
            return invalid("encoder.poll_interval_ms", "must be positive".to_string());
        }
        if self.player.status_interval_ms == 0 {
            return invalid("player.status_interval_ms", "must be positive".to_string());
        }

        let encoder = &self.encoder;
        if encoder.pin_a == encoder.pin_b
            || encoder.pin_a == encoder.pin_sw
            || encoder.pin_b == encoder.pin_sw
        {
            return invalid(
                "encoder.pin_a",
                format!(
                    "pins must be distinct (a={}, b={}, sw={})",
                    encoder.pin_a, encoder.pin_b, encoder.pin_sw
                ),
            );
        }

        if self.player.initial_volume > 100 {
            return invalid(
                "player.initial_volume",
                format!("{} is above 100", self.player.initial_volume),
            );
        }

        for (field, range) in [
            ("settings.brightness_active", self.settings.brightness_active),
            ("settings.brightness_dim", self.settings.brightness_dim),
            ("settings.off_timeout_s", self.settings.off_timeout_s),
        ] {
            if range.step == 0 {
                return invalid(field, "step must be positive".to_string());
            }
            if range.min > range.max {
                return invalid(field, format!("min {} exceeds max {}", range.min, range.max));
            }
        }
        for (field, range) in [
            ("settings.brightness_active", self.settings.brightness_active),
            ("settings.brightness_dim", self.settings.brightness_dim),
        ] {
            if range.max > 100 {
                return invalid(field, format!("max {} is above 100", range.max));
            }
        }
        if self.settings.off_timeout_s.min < display.dim_timeout_s {
            return invalid(
                "settings.off_timeout_s",
                format!(
                    "min {} is below dim_timeout_s {}",
                    self.settings.off_timeout_s.min, display.dim_timeout_s
                ),
            );
        }

        Ok(())
    }

    /// Current values of the editable settings, clamped to their bounds.
    pub fn setting_values(&self) -> SettingValues {
        let mut values = SettingValues {
            brightness_active: self.display.brightness_active,
            brightness_dim: self.display.brightness_dim,
            off_timeout_s: self.display.off_timeout_s,
        };
        for key in SettingKey::ALL {
            let range = self.settings.range(key);
            values.set(key, values.get(key).max(range.min).min(range.max));
        }
        values
    }

    /// Copy edited setting values back into the display section.
    pub fn apply_settings(&mut self, values: &SettingValues) {
        self.display.brightness_active = values.brightness_active;
        self.display.brightness_dim = values.brightness_dim;
        self.display.off_timeout_s = values.off_timeout_s;
    }
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
