use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::section::{DEFAULT_SEPARATOR_PADDING, DEFAULT_SEPARATOR_TOKEN, Separator};
use crate::app::infrastructure::error::{AppError, Result};

/// What to do when a document in the chapter list cannot be read at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnreadablePolicy {
    /// Leave the document out and compose the remaining ones.
    #[default]
    Skip,
    /// Fail the whole load.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default = "default_separator_token")]
    pub separator_token: String,

    /// Line breaks placed on both sides of the token.
    #[serde(default = "default_separator_padding")]
    pub separator_padding: String,

    /// Quiet period after the last edit before changed chapters are written.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// How long storage notifications for a chapter we just wrote are ignored.
    #[serde(default = "default_write_suppression_ms")]
    pub write_suppression_ms: u64,

    #[serde(default)]
    pub unreadable_policy: UnreadablePolicy,

    #[serde(default = "default_true")]
    pub enable_tables: bool,

    #[serde(default = "default_true")]
    pub enable_strikethrough: bool,
}

fn default_separator_token() -> String {
    DEFAULT_SEPARATOR_TOKEN.to_string()
}

fn default_separator_padding() -> String {
    DEFAULT_SEPARATOR_PADDING.to_string()
}

fn default_save_debounce_ms() -> u64 {
    1000
}

fn default_write_suppression_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            separator_token: default_separator_token(),
            separator_padding: default_separator_padding(),
            save_debounce_ms: default_save_debounce_ms(),
            write_suppression_ms: default_write_suppression_ms(),
            unreadable_policy: UnreadablePolicy::default(),
            enable_tables: true,
            enable_strikethrough: true,
        }
    }
}

impl ComposerSettings {
    pub fn separator(&self) -> Result<Separator> {
        Separator::new(&self.separator_token, &self.separator_padding)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn write_suppression(&self) -> Duration {
        Duration::from_millis(self.write_suppression_ms)
    }

    /// Load settings from the user config directory, or create defaults if
    /// the file does not exist yet.
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Failed to parse settings: {}. Using defaults.", e);
                    Self::default()
                }
            },
            Err(_) => {
                let default = Self::default();
                if let Err(e) = default.save() {
                    tracing::debug!("Could not write default settings: {}", e);
                }
                default
            }
        }
    }

    /// Load settings from an explicit path. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        Ok(())
    }

    /// Get config file path (cross-platform)
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("chapterpad");
        path.push("settings.json");
        path
    }

    pub fn validate(&self) -> Result<()> {
        self.separator()?;
        if self.save_debounce_ms == 0 {
            return Err(AppError::Settings("save_debounce_ms must be positive".to_string()));
        }
        Ok(())
    }
}
