//! Configuration system
//!
//! Startup settings for the window and graphics core, loadable from TOML or
//! RON files.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// File formats understood by [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, format)
    }

    /// Parse configuration from an in-memory document
    fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its valid range
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Open fullscreen on the primary monitor
    pub fullscreen: bool,
    /// Requested width in screen coordinates
    pub width: u32,
    /// Requested height in screen coordinates
    pub height: u32,
    /// Allow the user to resize the window; resize events raise the
    /// swapchain rebuild signal only when this is set
    pub resizable: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            fullscreen: false,
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// Graphics core settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsSettings {
    /// Choose the first qualifying adapter automatically
    pub auto_pick_device: bool,
    /// Adapter index used when `auto_pick_device` is off
    pub manual_device_index: usize,
    /// Enable validation layers and the debug messenger
    pub enable_debug_mode: bool,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            auto_pick_device: true,
            manual_device_index: 0,
            enable_debug_mode: false,
        }
    }
}

/// Everything read at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Window settings
    pub window: WindowSettings,
    /// Graphics settings
    pub graphics: GraphicsSettings,
}

impl Config for StartupConfig {}

impl StartupConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 {
            return Err(ConfigError::Invalid {
                key: "window.width",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.window.height == 0 {
            return Err(ConfigError::Invalid {
                key: "window.height",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StartupConfig::parse(
            "[window]\nwidth = 1920\nheight = 1080\n\n[graphics]\nauto_pick_device = false\nmanual_device_index = 2\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
        assert!(!config.window.fullscreen);
        assert!(config.window.resizable);
        assert!(!config.graphics.auto_pick_device);
        assert_eq!(config.graphics.manual_device_index, 2);
        assert!(!config.graphics.enable_debug_mode);
    }

    #[test]
    fn test_ron_document() {
        let config = StartupConfig::parse(
            "(window: (fullscreen: true), graphics: (enable_debug_mode: true))",
            ConfigFormat::Ron,
        )
        .unwrap();

        assert!(config.window.fullscreen);
        assert_eq!(config.window.width, 1280);
        assert!(config.graphics.enable_debug_mode);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = StartupConfig::load_from_file("settings.ini");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_zero_height_rejected() {
        let mut config = StartupConfig::default();
        config.window.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "window.height", .. })
        ));
    }

    #[test]
    fn test_save_then_load_toml() {
        let path = std::env::temp_dir().join(format!("ngine_config_{}.toml", std::process::id()));
        let mut config = StartupConfig::default();
        config.graphics.manual_device_index = 1;

        config.save_to_file(&path).unwrap();
        let loaded = StartupConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = StartupConfig::load_or_default("does/not/exist/ngine.toml").unwrap();
        assert_eq!(config, StartupConfig::default());
    }
}
