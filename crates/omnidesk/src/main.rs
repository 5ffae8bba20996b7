// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Omnidesk - omnichannel customer support service.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use omnidesk_config::{ConfigError, OmnideskConfig};

/// Omnidesk - webhook reconciliation and real-time agent rooms.
#[derive(Parser, Debug)]
#[command(name = "omnidesk", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP and socket server.
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<OmnideskConfig, Vec<ConfigError>> {
    match path {
        Some(path) => omnidesk_config::load_and_validate_path(path),
        None => omnidesk_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            omnidesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "omnidesk: configuration is valid (listen {}:{}, database {})",
                config.server.host, config.server.port, config.storage.database_path
            );
        }
        None => {
            println!("omnidesk: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["omnidesk", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));

        let cli =
            Cli::try_parse_from(["omnidesk", "check-config", "--config", "/tmp/o.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/o.toml")));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omnidesk.toml");
        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn unknown_keys_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omnidesk.toml");
        std::fs::write(&path, "[server]\nprot = 9090\n").unwrap();

        let errors = load_config(Some(&path)).unwrap_err();
        assert!(!errors.is_empty());
    }
}
