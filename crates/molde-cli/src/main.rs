// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use molde_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "molde")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Declarative project-archetype generation CLI", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project from an archetype script
    Generate {
        /// Path to the entry archetype-script XML
        script: String,
        /// Output directory (defaults to the project name in the cwd)
        #[arg(short, long)]
        output: Option<String>,
        /// External preset, as path=value (repeatable)
        #[arg(short, long = "preset", value_name = "PATH=VALUE")]
        presets: Vec<String>,
        /// External default, as path=value (repeatable)
        #[arg(short, long = "default", value_name = "PATH=VALUE")]
        defaults: Vec<String>,
        /// Never prompt; resolve from presets and defaults only
        #[arg(short, long)]
        batch: bool,
        /// Accept defaults for optional inputs without prompting
        #[arg(long)]
        skip_optional: bool,
    },
    /// Print the parsed tree of an archetype script
    Inspect {
        /// Path to the archetype-script XML
        script: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Generate {
            script,
            output,
            presets,
            defaults,
            batch,
            skip_optional,
        } => commands::generate::run(&script, output, presets, defaults, batch, skip_optional),
        Commands::Inspect { script } => commands::inspect::run(&script),
    }
}
