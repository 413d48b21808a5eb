//! Service configuration.
//!
//! `Settings` is the typed view of `conform.toml`; `ConfigManager` reads,
//! repairs and writes that file.
//!
//! ```no_run
//! use conform_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/conform.toml");
//! config.load_or_create()?;
//! config.apply_env_overrides();
//!
//! config.settings_mut().fitting.fit_tolerance_ms = 1;
//! config.update_section(ConfigSection::Fitting)?;
//! # Ok::<(), conform_core::config::ConfigError>(())
//! ```

mod manager;
mod settings;

pub use manager::{
    ConfigError, ConfigManager, ConfigResult, ENV_FFMPEG, ENV_FFPROBE, ENV_STORE_FOLDER,
    ENV_TEMP_ROOT,
};
pub use settings::{
    ConfigSection, EncodingSettings, FittingSettings, LoggingSettings, LoudnessSettings,
    PathSettings, ServerSettings, Settings, SourceSettings, StretchSettings, ToolSettings,
};
