use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "romi_teleop".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    // Connection
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: f64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub last_address: Option<String>,

    // Advanced BLE Settings
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_drive_uuid")]
    pub ble_drive_char_uuid: String,
    #[serde(default = "default_false")]
    pub write_with_response: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            connect_timeout_secs: default_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            last_address: None,
            ble_service_uuid: default_service_uuid(),
            ble_drive_char_uuid: default_drive_uuid(),
            write_with_response: default_false(),
        }
    }
}

impl Settings {
    /// Negative or NaN values mean no wait; values too large for a
    /// `Duration` saturate.
    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_timeout_secs() -> f64 {
    10.0
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_service_uuid() -> String {
    "85e43f4d-b4a7-4c6f-ba86-2db3c40a2c83".to_string()
}
fn default_drive_uuid() -> String {
    "85e47182-b4a7-4c6f-ba86-2db3c40a2c83".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory, falling back to defaults.
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit file. A missing or unreadable file yields defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("RomiTeleop");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Remember the last device we reached. Only writes when it changed.
    pub fn remember_address(&mut self, address: &str) -> anyhow::Result<()> {
        if self.settings.last_address.as_deref() != Some(address) {
            self.settings.last_address = Some(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.connect_timeout(), Duration::from_secs(10));
        assert_eq!(s.retry_delay(), Duration::from_millis(1000));
        assert_eq!(s.ble_drive_char_uuid, "85e47182-b4a7-4c6f-ba86-2db3c40a2c83");
        assert!(!s.write_with_response);
        assert_eq!(s.log_settings.level, "info");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{ "connect_timeout_secs": 2.5, "log_settings": { "level": "debug" } }"#)
                .unwrap();
        assert_eq!(s.connect_timeout(), Duration::from_millis(2500));
        assert_eq!(s.log_settings.level, "debug");
        assert!(s.log_settings.console_logging_enabled);
        assert_eq!(s.ble_service_uuid, default_service_uuid());
    }

    #[test]
    fn test_out_of_range_timeouts_do_not_panic() {
        let huge: Settings = serde_json::from_str(r#"{ "connect_timeout_secs": 1e300 }"#).unwrap();
        assert_eq!(huge.connect_timeout(), Duration::MAX);

        let negative: Settings =
            serde_json::from_str(r#"{ "connect_timeout_secs": -3.0 }"#).unwrap();
        assert_eq!(negative.connect_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let s: Settings =
            serde_json::from_str(r#"{ "ble_sensor_char_uuid": "85e4448d-b4a7-4c6f-ba86-2db3c40a2c83" }"#)
                .unwrap();
        assert_eq!(s.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = SettingsService::with_path(dir.path().join("nope.json"));
        assert_eq!(service.get().retry_delay_ms, 1000);
    }

    #[test]
    fn test_remember_address_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut service = SettingsService::with_path(path.clone());
        service.remember_address("c0:98:e5:49:00:01").unwrap();
        assert!(path.exists());

        let reloaded = SettingsService::with_path(path);
        assert_eq!(
            reloaded.get().last_address.as_deref(),
            Some("c0:98:e5:49:00:01")
        );
    }
}
