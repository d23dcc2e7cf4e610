//! Receiver configuration model, defaults and loading.

use std::path::{Path, PathBuf};

use log::{info, warn};

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    /// Cast runtime start options.
    pub receiver: RuntimeConfig,
    #[serde(default)]
    /// Engine and load defaults.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// On-screen feedback timing.
    pub ui: UiConfig,
    #[serde(default)]
    /// Log ring and debug mode.
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    /// Subtitle rendering defaults.
    pub subtitles: SubtitlesConfig,
}

/// Cast runtime log verbosity.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoggerLevel {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
    None,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_custom_namespace")]
    pub custom_namespace: String,
    #[serde(default = "default_true")]
    pub use_shaka_for_hls: bool,
    #[serde(default)]
    pub disable_idle_timeout: bool,
    #[serde(default = "default_max_inactivity_secs")]
    pub max_inactivity_secs: u32,
    #[serde(default)]
    pub logger_level: LoggerLevel,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
    #[serde(default = "default_seek_step_secs")]
    pub seek_step_secs: f64,
    #[serde(default = "default_buffering_goal_secs")]
    pub buffering_goal_secs: f64,
    #[serde(default = "default_rebuffering_goal_secs")]
    pub rebuffering_goal_secs: f64,
    #[serde(default = "default_buffer_behind_secs")]
    pub buffer_behind_secs: f64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u32,
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
    #[serde(default = "default_retry_fuzz_factor")]
    pub retry_fuzz_factor: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UiConfig {
    #[serde(default = "default_seek_feedback_ms")]
    pub seek_feedback_ms: u64,
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    #[serde(default = "default_status_broadcast_interval_ms")]
    pub status_broadcast_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SubtitlesConfig {
    #[serde(default = "default_subtitle_size")]
    pub default_size: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            custom_namespace: default_custom_namespace(),
            use_shaka_for_hls: true,
            disable_idle_timeout: false,
            max_inactivity_secs: default_max_inactivity_secs(),
            logger_level: LoggerLevel::Warning,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            default_content_type: default_content_type(),
            seek_step_secs: default_seek_step_secs(),
            buffering_goal_secs: default_buffering_goal_secs(),
            rebuffering_goal_secs: default_rebuffering_goal_secs(),
            buffer_behind_secs: default_buffer_behind_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_backoff_factor: default_retry_backoff_factor(),
            retry_fuzz_factor: default_retry_fuzz_factor(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            seek_feedback_ms: default_seek_feedback_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            status_broadcast_interval_ms: default_status_broadcast_interval_ms(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_capacity: default_log_capacity(),
        }
    }
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            default_size: default_subtitle_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_custom_namespace() -> String {
    "urn:x-cast:com.castreceiver.custom".to_string()
}

fn default_max_inactivity_secs() -> u32 {
    3600
}

fn default_content_type() -> String {
    "application/x-mpegURL".to_string()
}

fn default_seek_step_secs() -> f64 {
    10.0
}

fn default_buffering_goal_secs() -> f64 {
    10.0
}

fn default_rebuffering_goal_secs() -> f64 {
    2.0
}

fn default_buffer_behind_secs() -> f64 {
    3.0
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u32 {
    1000
}

fn default_retry_backoff_factor() -> f64 {
    2.0
}

fn default_retry_fuzz_factor() -> f64 {
    0.5
}

fn default_seek_feedback_ms() -> u64 {
    3000
}

fn default_inactivity_timeout_ms() -> u64 {
    5000
}

fn default_status_broadcast_interval_ms() -> u64 {
    1000
}

fn default_log_capacity() -> usize {
    100
}

fn default_subtitle_size() -> f64 {
    1.0
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Clamps values that would break timers, the log ring or the seek path.
pub fn sanitize_config(config: ReceiverConfig) -> ReceiverConfig {
    let ReceiverConfig {
        mut receiver,
        mut playback,
        mut ui,
        mut diagnostics,
        mut subtitles,
    } = config;

    if receiver.custom_namespace.trim().is_empty() {
        receiver.custom_namespace = default_custom_namespace();
    }
    if playback.default_content_type.trim().is_empty() {
        playback.default_content_type = default_content_type();
    }
    playback.seek_step_secs = finite_or(playback.seek_step_secs, default_seek_step_secs())
        .clamp(1.0, 600.0);
    playback.buffering_goal_secs =
        finite_or(playback.buffering_goal_secs, default_buffering_goal_secs()).max(0.0);
    playback.rebuffering_goal_secs =
        finite_or(playback.rebuffering_goal_secs, default_rebuffering_goal_secs()).max(0.0);
    playback.buffer_behind_secs =
        finite_or(playback.buffer_behind_secs, default_buffer_behind_secs()).max(0.0);
    playback.retry_backoff_factor =
        finite_or(playback.retry_backoff_factor, default_retry_backoff_factor()).max(1.0);
    playback.retry_fuzz_factor =
        finite_or(playback.retry_fuzz_factor, default_retry_fuzz_factor()).clamp(0.0, 1.0);

    ui.seek_feedback_ms = ui.seek_feedback_ms.clamp(250, 60_000);
    ui.inactivity_timeout_ms = ui.inactivity_timeout_ms.clamp(500, 600_000);
    ui.status_broadcast_interval_ms = ui.status_broadcast_interval_ms.clamp(50, 60_000);

    diagnostics.log_capacity = diagnostics.log_capacity.clamp(1, 10_000);

    subtitles.default_size = finite_or(subtitles.default_size, default_subtitle_size())
        .clamp(0.25, 4.0);

    ReceiverConfig {
        receiver,
        playback,
        ui,
        diagnostics,
        subtitles,
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cast-receiver").join("config.toml"))
}

/// Loads the config file, creating it with defaults when missing.
///
/// Parse failures fall back to defaults; only filesystem failures are errors.
pub fn load_or_create_config(path: &Path) -> Result<ReceiverConfig, String> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create config directory: {err}"))?;
        }
        let default_text = toml::to_string(&ReceiverConfig::default())
            .map_err(|err| format!("failed to serialize default config: {err}"))?;
        std::fs::write(path, default_text)
            .map_err(|err| format!("failed to write default config: {err}"))?;
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    Ok(sanitize_config(parse_config_or_default(&content)))
}

fn parse_config_or_default(content: &str) -> ReceiverConfig {
    match toml::from_str::<ReceiverConfig>(content) {
        Ok(config) => config,
        Err(err) => {
            warn!("Config file is malformed, using defaults: {}", err);
            ReceiverConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_config_or_default, sanitize_config, LoggerLevel, ReceiverConfig};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = ReceiverConfig::default();

        assert_eq!(
            config.receiver.custom_namespace,
            "urn:x-cast:com.castreceiver.custom"
        );
        assert!(config.receiver.use_shaka_for_hls);
        assert!(!config.receiver.disable_idle_timeout);
        assert_eq!(config.receiver.max_inactivity_secs, 3600);
        assert_eq!(config.receiver.logger_level, LoggerLevel::Warning);
        assert!(config.playback.autoplay);
        assert_eq!(config.playback.default_content_type, "application/x-mpegURL");
        assert!((config.playback.seek_step_secs - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.playback.retry_max_attempts, 5);
        assert_eq!(config.ui.seek_feedback_ms, 3000);
        assert_eq!(config.ui.inactivity_timeout_ms, 5000);
        assert_eq!(config.diagnostics.log_capacity, 100);
        assert!(!config.diagnostics.debug);
        assert!((config.subtitles.default_size - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_config_fills_missing_sections_with_defaults() {
        let partial = r#"
[playback]
autoplay = false

[diagnostics]
debug = true
"#;

        let parsed: ReceiverConfig = toml::from_str(partial).expect("config should parse");
        assert!(!parsed.playback.autoplay);
        assert_eq!(parsed.playback.default_content_type, "application/x-mpegURL");
        assert!(parsed.diagnostics.debug);
        assert_eq!(parsed.diagnostics.log_capacity, 100);
        assert_eq!(parsed.ui.seek_feedback_ms, 3000);
        assert_eq!(parsed.receiver.logger_level, LoggerLevel::Warning);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let parsed = parse_config_or_default("[playback\nautoplay = ");
        assert_eq!(parsed, ReceiverConfig::default());
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let mut config = ReceiverConfig::default();
        config.diagnostics.log_capacity = 0;
        config.ui.seek_feedback_ms = 0;
        config.playback.seek_step_secs = f64::NAN;
        config.playback.default_content_type = "  ".to_string();
        config.subtitles.default_size = 99.0;

        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.diagnostics.log_capacity, 1);
        assert_eq!(sanitized.ui.seek_feedback_ms, 250);
        assert!((sanitized.playback.seek_step_secs - 10.0).abs() < f64::EPSILON);
        assert_eq!(sanitized.playback.default_content_type, "application/x-mpegURL");
        assert!((sanitized.subtitles.default_size - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let text = toml::to_string(&ReceiverConfig::default()).expect("config should serialize");
        let parsed: ReceiverConfig = toml::from_str(&text).expect("config should parse");
        assert_eq!(parsed, ReceiverConfig::default());
    }
}
