//! Configuration management for the match server binary.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use match_server::{GameSettings, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

/// Default for connection_timeout
fn default_connection_timeout() -> u64 {
    60
}

fn default_target_rounds() -> u32 {
    3
}

fn default_win_bonus() -> i64 {
    10
}

fn default_leaderboard_limit() -> usize {
    50
}

fn default_starting_credits() -> i64 {
    100
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, game rules, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Game rule settings
    #[serde(default)]
    pub game: GameplaySettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Game rule configuration.
///
/// Controls series defaults and the credit economy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameplaySettings {
    /// Rounds per series when a request does not specify one;
    /// must be an odd positive integer
    #[serde(default = "default_target_rounds")]
    pub default_target_rounds: u32,
    /// Flat credit bonus for winning a bot series
    #[serde(default = "default_win_bonus")]
    pub win_bonus: i64,
    /// Number of rows in leaderboard broadcasts
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
    /// Credit balance seeded into fresh accounts
    #[serde(default = "default_starting_credits")]
    pub starting_credits: i64,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            default_target_rounds: default_target_rounds(),
            win_bonus: default_win_bonus(),
            leaderboard_limit: default_leaderboard_limit(),
            starting_credits: default_starting_credits(),
        }
    }
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
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: 1000,
                connection_timeout: 60,
            },
            game: GameplaySettings::default(),
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
    /// If the file doesn't exist, creates a default configuration file
    /// at the specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a match server
    /// configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            game: GameSettings {
                default_target_rounds: self.game.default_target_rounds,
                win_bonus: self.game.win_bonus,
                leaderboard_limit: self.game.leaderboard_limit,
                starting_credits: self.game.starting_credits,
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks network addresses, game rule values, and logging settings.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        // A series needs an odd round count so it cannot tie
        if self.game.default_target_rounds == 0 || self.game.default_target_rounds % 2 == 0 {
            return Err(format!(
                "default_target_rounds must be an odd positive integer, got {}",
                self.game.default_target_rounds
            ));
        }

        if self.game.leaderboard_limit == 0 {
            return Err("leaderboard_limit must be greater than 0".to_string());
        }

        if self.game.starting_credits < 0 {
            return Err("starting_credits cannot be negative".to_string());
        }

        // Validate log level
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.connection_timeout, 60);

        assert_eq!(config.game.default_target_rounds, 3);
        assert_eq!(config.game.win_bonus, 10);
        assert_eq!(config.game.leaderboard_limit, 50);
        assert_eq!(config.game.starting_credits, 100);

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        config.server.bind_address = "127.0.0.1:8080".to_string();
        config.game.default_target_rounds = 4;
        assert!(config.validate().is_err());

        config.game.default_target_rounds = 5;
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_server_config() {
        let config = AppConfig::default();
        let server_config = config
            .to_server_config()
            .expect("Default config should convert to ServerConfig");
        assert_eq!(server_config.max_connections, 1000);
        assert_eq!(server_config.connection_timeout, 60);
        assert_eq!(server_config.game.default_target_rounds, 3);
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path)
            .await
            .expect("Failed to load config");
        assert!(path.exists());
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");

        // A second load reads the file it just wrote.
        let reloaded = AppConfig::load_from_file(&path)
            .await
            .expect("Failed to reload config");
        assert_eq!(reloaded.game.starting_credits, 100);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("partial.toml");
        tokio::fs::write(
            &path,
            r#"
[server]
bind_address = "0.0.0.0:9000"

[logging]
level = "warn"
json_format = true
"#,
        )
        .await
        .expect("Failed to write partial config");

        let config = AppConfig::load_from_file(&path)
            .await
            .expect("Failed to load partial config");
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.game.win_bonus, 10);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
    }
}
