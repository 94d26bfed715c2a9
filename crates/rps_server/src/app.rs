//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, runtime, and graceful shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent},
};
use match_server::GameServer;
use tracing::{error, info, warn};

/// Main application struct.
///
/// The `Application` manages the complete lifecycle of the match
/// server: configuration loading, CLI overrides, server initialization,
/// and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Match server instance
    server: GameServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings,
    /// and initializes the match server.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize the match server with the configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = GameServer::new(server_config);

        info!(
            "📂 Config: {} | Bind: {}",
            args.config_path.display(),
            config.server.bind_address
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Starts the server in the background, waits for SIGINT/SIGTERM,
    /// then stops the accept loop and waits briefly for connections to
    /// drain. A second signal skips the graceful path.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting RPS Match Server Application");

        self.log_configuration_summary();

        let shutdown = self.server.shutdown_handle();

        // Start server in background
        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        info!("✅ Match server is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            self.config.server.bind_address
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        wait_for_shutdown_signal().await?;

        // merciless shutdown on a second signal
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");

        // Stop the accept loop and let the server task finish
        let _ = shutdown.send(());
        if tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle)
            .await
            .is_err()
        {
            warn!("⏰ Server task did not complete within timeout, proceeding with cleanup");
        } else {
            info!("✅ Server task completed gracefully");
        }

        // Give time for connection cleanup
        info!("⏳ Waiting for connections to close...");
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

        info!("✅ Match server shutdown complete");
        info!("👋 Thank you for playing!");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  ⏱️ Connection timeout: {}s",
            self.config.server.connection_timeout
        );
        info!(
            "  🎲 Default series: best of {}",
            self.config.game.default_target_rounds
        );
        info!(
            "  💰 Win bonus: {} | Starting credits: {}",
            self.config.game.win_bonus, self.config.game.starting_credits
        );
    }
}
