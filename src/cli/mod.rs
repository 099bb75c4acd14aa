//! Command-line interface for swinf-template.
//!
//! The `swinf-tpl` binary exposes the engine for scripting and for checking
//! template trees before deployment:
//!
//! - `render` - Render a template to stdout or a file
//! - `check` - Compile templates and report syntax errors
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: debug logging on stderr
//! - `--quiet` / `-q`: errors only
//! - `--config` / `-c`: engine configuration file (see [`crate::config`])
//!
//! # Examples
//!
//! ```bash
//! swinf-tpl render index --lookup ./views --var title=Home
//! swinf-tpl render --inline 'Hi {{name}}!' --var name=Bob
//! swinf-tpl --verbose check --lookup ./views --listing
//! ```

mod check;
mod render;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::TemplateConfig;

pub use check::CheckCommand;
pub use render::RenderCommand;

/// Settings derived from global flags.
///
/// Kept separate from [`Cli`] so tests can build one without parsing
/// arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter directive; `None` disables logging
    pub log_level: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the stderr log subscriber. `RUST_LOG` wins over the flag level.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if let Some(level) = &self.log_level {
            EnvFilter::new(level)
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the engine configuration named by `--config`, the environment, or
    /// the defaults.
    pub fn load_template_config(&self) -> Result<TemplateConfig> {
        TemplateConfig::load_or_default(self.config_path.as_deref())
    }
}

/// swinf template engine
#[derive(Parser, Debug)]
#[command(
    name = "swinf-tpl",
    about = "Render and check swinf templates",
    version,
    long_about = "Compile and render swinf templates: text with {{ expressions }} and %%/{% %} directives."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging on stderr.
    ///
    /// Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an engine configuration file.
    ///
    /// Overrides the `SWINF_TEMPLATE_CONFIG` environment variable.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template with JSON values.
    ///
    /// See [`RenderCommand`] for options.
    Render(RenderCommand),

    /// Compile templates and report errors without rendering.
    ///
    /// See [`CheckCommand`] for options.
    Check(CheckCommand),
}

impl Cli {
    /// Execute with the configuration built from the global flags.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("swinf_template=debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an injected configuration.
    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let template_config = config.load_template_config()?;

        match self.command {
            Commands::Render(cmd) => cmd.execute(template_config),
            Commands::Check(cmd) => cmd.execute(template_config),
        }
    }
}

/// Replace the configured lookup path when directories were given on the
/// command line.
fn apply_lookup(config: &mut TemplateConfig, lookup: &[PathBuf]) -> Result<()> {
    if lookup.is_empty() {
        return Ok(());
    }
    config.lookup = lookup.to_vec();
    config.expand_lookup()?;
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
