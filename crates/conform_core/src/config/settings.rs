//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{RequestLimits, MAX_TARGET_DURATION_MS};
use crate::planning::{
    LoudnessTarget, StretchBounds, DEFAULT_FADE_MS, FIT_TOLERANCE_MS,
    VERIFY_TOLERANCE_MS, MAX_STRETCH_FACTOR, MIN_STRETCH_FACTOR,
};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Source acquisition.
    #[serde(default)]
    pub sources: SourceSettings,

    /// Stretch safety window.
    #[serde(default)]
    pub stretch: StretchSettings,

    /// Loudness normalization targets.
    #[serde(default)]
    pub loudness: LoudnessSettings,

    /// Duration fitting and verification.
    #[serde(default)]
    pub fitting: FittingSettings,

    /// Output encoding.
    #[serde(default)]
    pub encoding: EncodingSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// HTTP server.
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Request validation bounds derived from the settings.
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_target_ms: self.fitting.max_target_ms.min(MAX_TARGET_DURATION_MS),
            min_bitrate_kbps: self.encoding.min_bitrate_kbps,
            max_bitrate_kbps: self.encoding.max_bitrate_kbps,
        }
    }
}

/// Path configuration for scratch, published results and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder for per-job scratch directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder holding published artifacts.
    #[serde(default = "default_store_folder")]
    pub store_folder: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_store_folder() -> String {
    "audio_out".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            store_folder: default_store_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Locations of the media engine executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
        }
    }
}

/// Source acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Download timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Accept `file://` URLs and bare paths as sources.
    #[serde(default)]
    pub allow_local_files: bool,
}

fn default_fetch_timeout() -> u64 {
    60
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            allow_local_files: false,
        }
    }
}

/// Stretch factor window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StretchSettings {
    #[serde(default = "default_min_factor")]
    pub min_factor: f64,

    #[serde(default = "default_max_factor")]
    pub max_factor: f64,
}

fn default_min_factor() -> f64 {
    MIN_STRETCH_FACTOR
}

fn default_max_factor() -> f64 {
    MAX_STRETCH_FACTOR
}

impl Default for StretchSettings {
    fn default() -> Self {
        Self {
            min_factor: default_min_factor(),
            max_factor: default_max_factor(),
        }
    }
}

impl StretchSettings {
    /// Configured window, never wider than the planning limits.
    pub fn bounds(&self) -> StretchBounds {
        StretchBounds {
            min: self.min_factor.max(MIN_STRETCH_FACTOR),
            max: self.max_factor.min(MAX_STRETCH_FACTOR),
        }
    }
}

/// EBU R128 targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessSettings {
    /// Integrated loudness target (LUFS).
    #[serde(default = "default_integrated")]
    pub integrated_lufs: f64,

    /// Loudness range target (LU).
    #[serde(default = "default_lra")]
    pub loudness_range_lu: f64,

    /// True peak ceiling (dBTP).
    #[serde(default = "default_true_peak")]
    pub true_peak_dbtp: f64,

    /// Fade-in / fade-out length in milliseconds.
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
}

fn default_integrated() -> f64 {
    -23.0
}

fn default_lra() -> f64 {
    7.0
}

fn default_true_peak() -> f64 {
    -1.0
}

fn default_fade_ms() -> u64 {
    DEFAULT_FADE_MS
}

impl Default for LoudnessSettings {
    fn default() -> Self {
        Self {
            integrated_lufs: default_integrated(),
            loudness_range_lu: default_lra(),
            true_peak_dbtp: default_true_peak(),
            fade_ms: default_fade_ms(),
        }
    }
}

impl LoudnessSettings {
    pub fn target(&self) -> LoudnessTarget {
        LoudnessTarget {
            integrated_lufs: self.integrated_lufs,
            loudness_range_lu: self.loudness_range_lu,
            true_peak_dbtp: self.true_peak_dbtp,
        }
    }
}

/// Duration fitting and final verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittingSettings {
    /// No trim/pad is issued when `|target - measured|` is within this.
    #[serde(default = "default_fit_tolerance")]
    pub fit_tolerance_ms: u64,

    /// Maximum allowed deviation of the encoded artifact.
    #[serde(default = "default_verify_tolerance")]
    pub verify_tolerance_ms: u64,

    /// Largest accepted target duration.
    #[serde(default = "default_max_target")]
    pub max_target_ms: u64,
}

fn default_fit_tolerance() -> u64 {
    FIT_TOLERANCE_MS
}

fn default_verify_tolerance() -> u64 {
    VERIFY_TOLERANCE_MS
}

fn default_max_target() -> u64 {
    MAX_TARGET_DURATION_MS
}

impl FittingSettings {
    pub fn fit_tolerance(&self) -> u64 {
        self.fit_tolerance_ms.min(FIT_TOLERANCE_MS)
    }

    pub fn verify_tolerance(&self) -> u64 {
        self.verify_tolerance_ms.min(VERIFY_TOLERANCE_MS)
    }
}

impl Default for FittingSettings {
    fn default() -> Self {
        Self {
            fit_tolerance_ms: default_fit_tolerance(),
            verify_tolerance_ms: default_verify_tolerance(),
            max_target_ms: default_max_target(),
        }
    }
}

/// Output encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    #[serde(default = "default_min_bitrate")]
    pub min_bitrate_kbps: u32,

    #[serde(default = "default_max_bitrate")]
    pub max_bitrate_kbps: u32,

    /// Prefix of published artifact names.
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

fn default_min_bitrate() -> u32 {
    32
}

fn default_max_bitrate() -> u32 {
    320
}

fn default_artifact_prefix() -> String {
    "chronique".to_string()
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            min_bitrate_kbps: default_min_bitrate(),
            max_bitrate_kbps: default_max_bitrate(),
            artifact_prefix: default_artifact_prefix(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format (engine output only kept in the tail buffer).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of engine output lines to show on error.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Write a log file per job into the logs folder.
    #[serde(default)]
    pub job_log_files: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            job_log_files: false,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Route prefix used in `download_url`.
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_download_prefix() -> String {
    "/dl".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            download_prefix: default_download_prefix(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Tools,
    Sources,
    Stretch,
    Loudness,
    Fitting,
    Encoding,
    Logging,
    Server,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 9] = [
        ConfigSection::Paths,
        ConfigSection::Tools,
        ConfigSection::Sources,
        ConfigSection::Stretch,
        ConfigSection::Loudness,
        ConfigSection::Fitting,
        ConfigSection::Encoding,
        ConfigSection::Logging,
        ConfigSection::Server,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Tools => "tools",
            ConfigSection::Sources => "sources",
            ConfigSection::Stretch => "stretch",
            ConfigSection::Loudness => "loudness",
            ConfigSection::Fitting => "fitting",
            ConfigSection::Encoding => "encoding",
            ConfigSection::Logging => "logging",
            ConfigSection::Server => "server",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Scratch, published results and log directories",
            ConfigSection::Tools => "Media engine executables",
            ConfigSection::Sources => "Source clip acquisition",
            ConfigSection::Stretch => "Primary stretch factor safety window",
            ConfigSection::Loudness => "EBU R128 two-pass normalization targets",
            ConfigSection::Fitting => "Exact duration fitting and final verification",
            ConfigSection::Encoding => "Output encoding",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Server => "HTTP server",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[loudness]"));
        assert!(toml.contains("store_folder"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.paths.store_folder, settings.paths.store_folder);
        assert_eq!(parsed.stretch.max_factor, 1.25);
        assert_eq!(parsed.logging.level, LogLevel::Info);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[stretch]\nmin_factor = 0.9";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.stretch.min_factor, 0.9);
        // Defaults applied for missing
        assert_eq!(parsed.stretch.max_factor, 1.25);
        assert_eq!(parsed.loudness.integrated_lufs, -23.0);
        assert_eq!(parsed.fitting.verify_tolerance_ms, 1);
    }

    #[test]
    fn request_limits_follow_settings() {
        let mut settings = Settings::default();
        settings.fitting.max_target_ms = 60_000;
        let limits = settings.request_limits();
        assert_eq!(limits.max_target_ms, 60_000);
        assert_eq!(limits.max_bitrate_kbps, 320);
    }

    #[test]
    fn widened_limits_fall_back_to_planning_limits() {
        let mut settings = Settings::default();
        settings.stretch.min_factor = 0.1;
        settings.stretch.max_factor = 5.0;
        settings.fitting.max_target_ms = 900_000;
        settings.fitting.fit_tolerance_ms = 50;
        settings.fitting.verify_tolerance_ms = 500;

        let bounds = settings.stretch.bounds();
        assert_eq!(bounds.min, MIN_STRETCH_FACTOR);
        assert_eq!(bounds.max, MAX_STRETCH_FACTOR);
        assert_eq!(settings.request_limits().max_target_ms, MAX_TARGET_DURATION_MS);
        assert_eq!(settings.fitting.fit_tolerance(), FIT_TOLERANCE_MS);
        assert_eq!(settings.fitting.verify_tolerance(), VERIFY_TOLERANCE_MS);
    }

    #[test]
    fn narrowed_limits_are_kept() {
        let mut settings = Settings::default();
        settings.stretch.max_factor = 1.1;
        settings.fitting.fit_tolerance_ms = 0;

        assert_eq!(settings.stretch.bounds().max, 1.1);
        assert_eq!(settings.stretch.bounds().min, MIN_STRETCH_FACTOR);
        assert_eq!(settings.fitting.fit_tolerance(), 0);
    }
}
