//! Settings file handling.
//!
//! The file on disk is always complete: reading it fills absent keys from
//! defaults, and `load_or_create` writes the cleaned result back when a
//! table was missing or unrecognized. Writes go through a sibling temp file
//! and a rename so a crash never leaves a truncated config. Single tables
//! can be replaced with `update_section` without touching the rest of the
//! document (hand-written comments in other tables survive).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};
use crate::models::MAX_TARGET_DURATION_MS;
use crate::planning::{
    FIT_TOLERANCE_MS, MAX_STRETCH_FACTOR, MIN_STRETCH_FACTOR, VERIFY_TOLERANCE_MS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Config is not valid TOML for these settings: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("Settings could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Config document could not be edited: {0}")]
    Document(#[from] toml_edit::TomlError),

    #[error("No config at {0}")]
    Missing(PathBuf),

    #[error("{key}: {message}")]
    Rejected { key: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Environment variables that override file values.
pub const ENV_STORE_FOLDER: &str = "CONFORM_STORE_FOLDER";
pub const ENV_TEMP_ROOT: &str = "CONFORM_TEMP_ROOT";
pub const ENV_FFMPEG: &str = "CONFORM_FFMPEG";
pub const ENV_FFPROBE: &str = "CONFORM_FFPROBE";

/// Owns the settings file and the in-memory `Settings` read from it.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Starts with defaults; nothing is read until `load*` is called.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until `save` or `update_section`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Read the existing file; a missing file is an error.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.is_file() {
            return Err(ConfigError::Missing(self.config_path.clone()));
        }
        let (settings, _) = self.read_file()?;
        self.settings = settings;
        Ok(())
    }

    /// Read the file, or write a fresh default one if there is none.
    ///
    /// An existing file with missing or unknown tables is rewritten in
    /// canonical form after a successful read.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.config_path.is_file() {
            self.settings = Settings::default();
            tracing::info!("Writing default config to {}", self.config_path.display());
            return self.save();
        }

        let (settings, needs_rewrite) = self.read_file()?;
        self.settings = settings;
        if needs_rewrite {
            tracing::debug!("Normalizing config {}", self.config_path.display());
            self.save()?;
        }
        Ok(())
    }

    /// Apply `CONFORM_*` environment overrides. Never written back.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let slots: [(&str, &mut String); 4] = [
            (ENV_STORE_FOLDER, &mut self.settings.paths.store_folder),
            (ENV_TEMP_ROOT, &mut self.settings.paths.temp_root),
            (ENV_FFMPEG, &mut self.settings.tools.ffmpeg_path),
            (ENV_FFPROBE, &mut self.settings.tools.ffprobe_path),
        ];

        for (key, slot) in slots {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => {
                    tracing::debug!("{} overrides config value", key);
                    *slot = value;
                }
                _ => {}
            }
        }
    }

    /// Create the store, scratch and log directories.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [&paths.store_folder, &paths.temp_root, &paths.logs_folder] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Write every table, each preceded by its comment.
    pub fn save(&self) -> ConfigResult<()> {
        validate(&self.settings)?;
        let mut text = String::from("# Audio Conform settings\n");
        for section in ConfigSection::ALL {
            text.push_str(&format!(
                "\n# {}\n[{}]\n{}",
                section.comment(),
                section.table_name(),
                self.table_text(section)?
            ));
        }
        self.write_atomically(&text)?;
        Ok(())
    }

    /// Replace one table in the on-disk document with the in-memory values.
    ///
    /// Other tables are kept exactly as they are on disk, even if the
    /// in-memory settings differ.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        validate(&self.settings)?;
        let mut doc = match fs::read_to_string(&self.config_path) {
            Ok(text) => text.parse::<DocumentMut>()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => return Err(e.into()),
        };

        let table = self.table_text(section)?.parse::<DocumentMut>()?;
        doc[section.table_name()] = Item::Table(table.as_table().clone());

        self.write_atomically(&doc.to_string())?;
        Ok(())
    }

    /// Decode and check the file. The flag is set when tables are missing
    /// or unknown.
    fn read_file(&self) -> ConfigResult<(Settings, bool)> {
        let text = fs::read_to_string(&self.config_path)?;
        let settings: Settings = toml::from_str(&text)?;
        validate(&settings)?;

        let doc: DocumentMut = text.parse()?;
        let known = |key: &str| ConfigSection::ALL.iter().any(|s| s.table_name() == key);
        let has_unknown = doc.iter().any(|(key, _)| !known(key));
        let has_missing = ConfigSection::ALL
            .iter()
            .any(|s| !doc.contains_key(s.table_name()));

        Ok((settings, has_unknown || has_missing))
    }

    fn table_text(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        Ok(match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths)?,
            ConfigSection::Tools => toml::to_string_pretty(&s.tools)?,
            ConfigSection::Sources => toml::to_string_pretty(&s.sources)?,
            ConfigSection::Stretch => toml::to_string_pretty(&s.stretch)?,
            ConfigSection::Loudness => toml::to_string_pretty(&s.loudness)?,
            ConfigSection::Fitting => toml::to_string_pretty(&s.fitting)?,
            ConfigSection::Encoding => toml::to_string_pretty(&s.encoding)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
            ConfigSection::Server => toml::to_string_pretty(&s.server)?,
        })
    }

    fn write_atomically(&self, text: &str) -> io::Result<()> {
        if let Some(dir) = self.config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Sibling path keeps the rename on one filesystem
        let staging = self.config_path.with_extension("toml.tmp");
        let mut file = fs::File::create(&staging)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &self.config_path)
    }
}

/// Reject settings the pipeline cannot run with.
///
/// The stretch window, the target cap and both tolerances may be narrowed
/// but never widened past the planning limits.
fn validate(settings: &Settings) -> ConfigResult<()> {
    let stretch = &settings.stretch;
    if !(stretch.min_factor > 0.0 && stretch.min_factor <= stretch.max_factor) {
        return Err(ConfigError::Rejected {
            key: "stretch.min_factor",
            message: format!(
                "must be positive and not above max_factor ({})",
                stretch.max_factor
            ),
        });
    }
    if stretch.min_factor < MIN_STRETCH_FACTOR {
        return Err(ConfigError::Rejected {
            key: "stretch.min_factor",
            message: format!("must not be below {}", MIN_STRETCH_FACTOR),
        });
    }
    if stretch.max_factor > MAX_STRETCH_FACTOR {
        return Err(ConfigError::Rejected {
            key: "stretch.max_factor",
            message: format!("must not be above {}", MAX_STRETCH_FACTOR),
        });
    }

    let encoding = &settings.encoding;
    if encoding.min_bitrate_kbps == 0 || encoding.min_bitrate_kbps > encoding.max_bitrate_kbps {
        return Err(ConfigError::Rejected {
            key: "encoding.min_bitrate_kbps",
            message: format!(
                "must be positive and not above max_bitrate_kbps ({})",
                encoding.max_bitrate_kbps
            ),
        });
    }

    let fitting = &settings.fitting;
    if fitting.max_target_ms == 0 || fitting.max_target_ms > MAX_TARGET_DURATION_MS {
        return Err(ConfigError::Rejected {
            key: "fitting.max_target_ms",
            message: format!("must be in (0, {}]", MAX_TARGET_DURATION_MS),
        });
    }
    if fitting.fit_tolerance_ms > FIT_TOLERANCE_MS {
        return Err(ConfigError::Rejected {
            key: "fitting.fit_tolerance_ms",
            message: format!("must not be above {}", FIT_TOLERANCE_MS),
        });
    }
    if fitting.verify_tolerance_ms > VERIFY_TOLERANCE_MS {
        return Err(ConfigError::Rejected {
            key: "fitting.verify_tolerance_ms",
            message: format!("must not be above {}", VERIFY_TOLERANCE_MS),
        });
    }

    Ok(())
}
