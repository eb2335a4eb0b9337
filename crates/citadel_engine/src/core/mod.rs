//! Core application services: configuration.

pub mod config;

pub use config::{AppConfig, CameraConfig, ConfigError, PathsConfig, WindowConfig};
