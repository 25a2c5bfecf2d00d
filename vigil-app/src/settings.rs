//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vigil_core::{AlarmTone, BeepTone, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Detection service root, e.g. `http://localhost:3000`.
    pub detection_base_url: String,
    /// Per-request timeout in seconds (video analysis can take a while).
    pub request_timeout_secs: u64,
    /// User-selected output device for alert playback.
    pub preferred_output_device: Option<String>,
    /// Sound the alarm automatically on High severity results.
    pub alarm_on_high: bool,
    pub alarm_duration_ms: u32,
    pub alarm_high_hz: f32,
    pub alarm_low_hz: f32,
    /// Play a short acknowledgement beep for non-High results.
    pub beep_on_result: bool,
    pub beep_hz: f32,
    pub beep_duration_ms: u32,
    pub history_enabled: bool,
    pub retention_days: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            detection_base_url: "http://localhost:3000".into(),
            request_timeout_secs: 120,
            preferred_output_device: None,
            alarm_on_high: true,
            alarm_duration_ms: vigil_core::alarm::DEFAULT_ALARM_DURATION_MS,
            alarm_high_hz: vigil_core::alarm::DEFAULT_ALARM_HIGH_HZ,
            alarm_low_hz: vigil_core::alarm::DEFAULT_ALARM_LOW_HZ,
            beep_on_result: true,
            beep_hz: vigil_core::alarm::DEFAULT_BEEP_HZ,
            beep_duration_ms: vigil_core::alarm::DEFAULT_BEEP_DURATION_MS,
            history_enabled: true,
            retention_days: 90,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.detection_base_url = self.detection_base_url.trim().trim_end_matches('/').to_string();
        if self.detection_base_url.is_empty() {
            self.detection_base_url = AppSettings::default().detection_base_url;
        }
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 600);
        self.alarm_duration_ms = self.alarm_duration_ms.clamp(100, 30_000);
        self.alarm_high_hz = self.alarm_high_hz.clamp(100.0, 4_000.0);
        self.alarm_low_hz = self.alarm_low_hz.clamp(100.0, 4_000.0);
        if self.alarm_low_hz > self.alarm_high_hz {
            std::mem::swap(&mut self.alarm_low_hz, &mut self.alarm_high_hz);
        }
        self.beep_hz = self.beep_hz.clamp(100.0, 8_000.0);
        self.beep_duration_ms = self.beep_duration_ms.clamp(50, 2_000);
        self.retention_days = self.retention_days.clamp(1, 3_650);
        self.preferred_output_device = self
            .preferred_output_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn alarm_tone(&self) -> AlarmTone {
        AlarmTone {
            duration_ms: self.alarm_duration_ms,
            high_hz: self.alarm_high_hz,
            low_hz: self.alarm_low_hz,
        }
    }

    pub fn beep_tone(&self) -> BeepTone {
        BeepTone {
            frequency_hz: self.beep_hz,
            duration_ms: self.beep_duration_ms,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            alarm_on_high: self.alarm_on_high,
            beep_on_result: self.beep_on_result,
            alarm: self.alarm_tone(),
            beep: self.beep_tone(),
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("Vigil")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("vigil")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut settings = AppSettings {
            detection_base_url: "http://localhost:3000///".into(),
            request_timeout_secs: 1,
            alarm_duration_ms: 5,
            alarm_high_hz: 50.0,
            alarm_low_hz: 9_999.0,
            beep_duration_ms: 0,
            retention_days: 0,
            ..AppSettings::default()
        };
        settings.normalize();

        assert_eq!(settings.detection_base_url, "http://localhost:3000");
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(settings.alarm_duration_ms, 100);
        // Clamped, then ordered: high ≥ low.
        assert!(settings.alarm_high_hz >= settings.alarm_low_hz);
        assert_eq!(settings.beep_duration_ms, 50);
        assert_eq!(settings.retention_days, 1);
    }

    #[test]
    fn unknown_or_missing_fields_fall_back_to_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"alarmDurationMs": 1500}"#).unwrap();
        assert_eq!(settings.alarm_duration_ms, 1_500);
        assert_eq!(settings.alarm_high_hz, 800.0);
        assert!(settings.alarm_on_high);
    }

    #[test]
    fn engine_config_mirrors_the_alarm_settings() {
        let settings = AppSettings::default();
        let config = settings.engine_config();
        assert_eq!(config.alarm.duration_ms, 3_000);
        assert_eq!(config.alarm.high_hz, 800.0);
        assert_eq!(config.alarm.low_hz, 600.0);
        assert_eq!(config.beep.frequency_hz, 1_000.0);
    }
}
