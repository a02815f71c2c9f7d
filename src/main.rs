//! Stencil - on-demand template compiler.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use stencil::cli::{Cli, Commands, precompile::precompile, render::render};
use stencil::logger;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = cli.load_config().context("failed to load configuration")?;
    logger::set_verbose(cli.verbose || config.log.verbose);

    match &cli.command {
        Commands::Precompile { dir } => {
            precompile(config, dir.as_deref()).map(|()| ExitCode::SUCCESS)
        }
        Commands::Render { path, params } => render(config, path, params),
    }
}
