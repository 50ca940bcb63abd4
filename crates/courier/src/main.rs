// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - WhatsApp session lifecycle and message coalescing.
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
use courier_config::CourierConfig;

/// Courier - WhatsApp session lifecycle and message coalescing.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server and session core.
    Serve,
    /// Validate the configuration and print the effective values.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> CourierConfig {
    let loaded = match path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Renders the config as TOML with credentials masked.
fn effective_config(config: &CourierConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    for key in [
        &mut shown.gateway.api_key,
        &mut shown.jobs.api_key,
        &mut shown.agent.api_key,
    ] {
        if key.is_some() {
            *key = Some("[redacted]".to_string());
        }
    }
    toml::to_string_pretty(&shown)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("courier: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => match effective_config(&config) {
            Ok(rendered) => {
                eprintln!("courier: configuration is valid");
                print!("{rendered}");
            }
            Err(e) => {
                eprintln!("courier: failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("courier: use --help for available commands");
        }
    }
}
