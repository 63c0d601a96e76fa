//! Configuration for the exam proctor.

use crate::session::SessionSettings;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for proctored sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between environment samples
    #[serde(with = "duration_serde")]
    pub sample_period: Duration,

    /// Analysed samples before presence violations may pause the exam
    pub grace_ticks: u32,

    /// Seconds allowed to return to fullscreen
    pub fullscreen_timeout_secs: u32,

    /// Mean spectrum level (0-255) above which the microphone counts as active
    pub mic_floor: f64,

    /// Number of spectra averaged for microphone activity
    pub mic_window: usize,

    /// Upper bound on a single collaborator call
    #[serde(with = "duration_serde")]
    pub analysis_timeout: Duration,

    /// Length of the exam
    pub exam_duration_secs: u32,

    /// Stop the exam clock while paused by a violation
    pub pause_clock_on_violation: bool,

    /// Path for exporting results reports
    pub export_path: PathBuf,

    /// Path for storing quizzes and the audit log
    pub data_path: PathBuf,

    /// IANA timezone used for local timestamps in reports
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exam-proctor");
        let settings = SessionSettings::default();

        Self {
            sample_period: settings.sample_period,
            grace_ticks: settings.grace_ticks,
            fullscreen_timeout_secs: settings.fullscreen_timeout_secs,
            mic_floor: settings.mic_floor,
            mic_window: settings.mic_window,
            analysis_timeout: settings.analysis_timeout,
            exam_duration_secs: settings.exam_duration_secs,
            pause_clock_on_violation: settings.pause_clock_on_violation,
            export_path: data_dir.join("results"),
            data_path: data_dir,
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exam-proctor")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.quiz_dir())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Directory of the file-backed quiz store.
    pub fn quiz_dir(&self) -> PathBuf {
        self.data_path.join("quizzes")
    }

    /// Cumulative audit statistics file.
    pub fn audit_path(&self) -> PathBuf {
        self.data_path.join("audit.json")
    }

    /// The configured timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::ParseError(format!("unknown timezone {}", self.timezone)))
    }

    /// Session tunables derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            sample_period: self.sample_period,
            grace_ticks: self.grace_ticks,
            fullscreen_timeout_secs: self.fullscreen_timeout_secs,
            mic_floor: self.mic_floor,
            mic_window: self.mic_window,
            analysis_timeout: self.analysis_timeout,
            exam_duration_secs: self.exam_duration_secs,
            pause_clock_on_violation: self.pause_clock_on_violation,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_period, Duration::from_secs(5));
        assert_eq!(config.grace_ticks, 3);
        assert_eq!(config.fullscreen_timeout_secs, 30);
        assert!(!config.pause_clock_on_violation);
        assert_eq!(config.tz().unwrap(), Tz::UTC);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "sample_period": 2, "timezone": "Europe/Paris" }"#).unwrap();
        assert_eq!(config.sample_period, Duration::from_secs(2));
        assert_eq!(config.exam_duration_secs, 600);
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Paris);
    }

    #[test]
    fn test_unknown_timezone() {
        let config = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.tz(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_session_settings_follow_config() {
        let config = Config {
            grace_ticks: 5,
            exam_duration_secs: 90,
            ..Config::default()
        };
        let settings = config.session_settings();
        assert_eq!(settings.grace_ticks, 5);
        assert_eq!(settings.exam_duration_secs, 90);
    }
}
