//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::calibration::MIN_REGION_SIZE;
use crate::overlay::Viewport;
use crate::vision::LanguageSpec;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Region editor settings
    pub editor: EditorSettings,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Storage settings
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Viewport the reference screenshot is fitted into
    pub fn viewport(&self) -> Viewport {
        Viewport {
            max_width: self.editor.max_display_width,
            max_height: self.editor.max_display_height,
        }
    }

    /// Reject settings the editor cannot work with
    pub fn validate(&self) -> Result<()> {
        let editor = &self.editor;
        ensure!(
            editor.max_display_width.is_finite() && editor.max_display_width > 0.0,
            "editor.max_display_width must be positive, got {}",
            editor.max_display_width
        );
        ensure!(
            editor.max_display_height.is_finite() && editor.max_display_height > 0.0,
            "editor.max_display_height must be positive, got {}",
            editor.max_display_height
        );
        ensure!(
            editor.min_region_size.is_finite() && editor.min_region_size >= 0.0,
            "editor.min_region_size must not be negative, got {}",
            editor.min_region_size
        );
        Ok(())
    }

    /// Language tags the engine is initialized with
    pub fn languages(&self) -> LanguageSpec {
        LanguageSpec {
            primary: self.recognition.primary_language.clone(),
            secondary: self.recognition.secondary_language.clone(),
        }
    }
}

/// Region editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Maximum width the reference screenshot is displayed at
    pub max_display_width: f32,
    /// Maximum height the reference screenshot is displayed at
    pub max_display_height: f32,
    /// Rectangles smaller than this (display pixels) are discarded
    pub min_region_size: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            max_display_width: viewport.max_width,
            max_display_height: viewport.max_height,
            min_region_size: MIN_REGION_SIZE,
        }
    }
}

/// Recognition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Engine tag for the primary language
    pub primary_language: String,
    /// Engine tag for the secondary language
    pub secondary_language: String,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        let languages = LanguageSpec::default();
        Self {
            primary_language: languages.primary,
            secondary_language: languages.secondary,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Calibration file override; the data directory is used when unset
    pub calibration_file: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))?;
    config
        .validate()
        .with_context(|| format!("Invalid config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load configuration from file, or the defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!("No config at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }

    let config = load_config(path)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}
