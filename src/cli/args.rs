//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ConfigError, EngineConfig};

/// Stencil template engine CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: stencil.toml in the current directory)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every template under a directory ahead of traffic
    #[command(visible_alias = "p")]
    Precompile {
        /// Directory to walk (relative to the template root)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Render one page to stdout
    #[command(visible_alias = "r")]
    Render {
        /// Logical template path, e.g. /index.tpl
        path: String,

        /// Request parameter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

impl Cli {
    /// Load the engine configuration this invocation points at.
    ///
    /// An explicit `--config` must exist; without one `stencil.toml` in the
    /// current directory is optional.
    pub fn load_config(&self) -> Result<EngineConfig, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_path(path)?,
            None => EngineConfig::load_or_default(&cwd)?,
        };
        if config.root.is_relative() {
            config.root = cwd.join(&config.root);
        }
        Ok(config)
    }
}

/// Parse a `key=value` request parameter.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
