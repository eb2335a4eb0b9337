//! Application configuration loaded from a TOML file.
//!
//! Every field has a sensible default, so a missing or partial config file
//! still produces a runnable setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Window creation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Citadel".to_string(),
        }
    }
}

/// Initial camera placement and control tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub fov_y_degrees: f32,
    pub near_z: f32,
    pub far_z: f32,
    pub move_speed: f32,
    pub degrees_per_pixel: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 15.0, -80.0],
            fov_y_degrees: 45.0,
            near_z: 1.0,
            far_z: 1000.0,
            move_speed: 50.0,
            degrees_per_pixel: 0.25,
        }
    }
}

/// Asset locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub shader_dir: PathBuf,
    pub texture_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders/compiled"),
            texture_dir: PathBuf::from("textures"),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load from a TOML file. A missing file is not an error; defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = AppConfig::default();
        assert!(config.window.width > 0 && config.window.height > 0);
        assert!(config.camera.near_z < config.camera.far_z);
        assert!(config.camera.move_speed > 0.0);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [window]
            width = 720
            height = 720

            [camera]
            position = [0.0, 2.0, -15.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 720);
        assert_eq!(config.window.title, "Citadel");
        assert_eq!(config.camera.position, [0.0, 2.0, -15.0]);
        assert_eq!(config.camera.fov_y_degrees, 45.0);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.window.width, AppConfig::default().window.width);
    }
}
