// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driftbottle - an anonymous message-in-a-bottle relay.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Driftbottle - an anonymous message-in-a-bottle relay.
#[derive(Parser, Debug)]
#[command(name = "driftbottle", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP relay.
    Serve {
        /// Keep all state in memory; nothing is read from or written to disk.
        #[arg(long)]
        ephemeral: bool,
    },
    /// List letters that have not reached a recipient.
    Pending,
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match driftbottle_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            driftbottle_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve { ephemeral }) => serve::run_serve(config, ephemeral).await,
        Some(Commands::Pending) => commands::run_pending(&config).await,
        Some(Commands::Config) => commands::run_config(&config),
        None => {
            println!("driftbottle: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("driftbottle: {e}");
        std::process::exit(1);
    }
}
