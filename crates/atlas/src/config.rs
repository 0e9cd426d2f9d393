//! Configuration management for the Atlas world server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use world_server::WorldConfig;

fn default_start_marker() -> String {
    "start".to_string()
}

fn default_world_name() -> String {
    "atlas".to_string()
}

/// Application configuration loaded from TOML file.
///
/// Encompasses all server settings: world behavior and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// World/server configuration settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// World-level configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Display name of the hosted world
    #[serde(default = "default_world_name")]
    pub world_name: String,
    /// Name of the spawn marker used when a transition has no explicit position
    #[serde(default = "default_start_marker")]
    pub start_marker: String,
    /// Whether map instances emptied by a transition are evicted
    #[serde(default)]
    pub evict_empty_instances: bool,
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                world_name: default_world_name(),
                start_marker: default_start_marker(),
                evict_empty_instances: false,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation
    /// failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to the world server's
    /// transition configuration.
    pub fn to_world_config(&self) -> WorldConfig {
        WorldConfig {
            start_marker: self.server.start_marker.clone(),
            evict_empty_instances: self.server.evict_empty_instances,
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.world_name.is_empty() {
            return Err("World name cannot be empty".to_string());
        }

        if self.server.start_marker.is_empty() {
            return Err("Start marker name cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
