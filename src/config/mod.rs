//! Engine configuration.
//!
//! A [`TemplateConfig`] collects everything the engine needs besides the
//! templates themselves: the lookup path, file extensions and encoding, the
//! reload and escaping switches, the include depth limit and the directive
//! syntax. Every field has a default, so a configuration file only lists what
//! it changes.
//!
//! # Configuration File
//!
//! ```toml
//! # Recompile templates on every render (development)
//! debug = true
//! # Write unmarked {{ }} values raw and escape {{! }} instead
//! noescape = false
//! encoding = "utf-8"              # or "latin-1"
//! lookup = ["./views", "~/shared/views"]
//! extensions = ["", "tpl", "shtml"]
//! max_include_depth = 32
//!
//! [syntax]
//! single_line = "%%"
//! block_start = "{%"
//! block_end = "%}"
//! continuation = "\\"
//! ```
//!
//! Lookup entries are expanded with `shellexpand`, so `~` and `$VAR` work.
//!
//! # Location Priority
//!
//! 1. An explicit path (the CLI `--config` flag)
//! 2. The `SWINF_TEMPLATE_CONFIG` environment variable
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```rust,no_run
//! use swinf_template::config::TemplateConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = TemplateConfig::load_or_default(None)?;
//! println!("Searching {:?}", config.lookup);
//! # Ok(())
//! # }
//! ```

mod parser;

pub use parser::parse_config;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::TemplateError;
use crate::templating::directive::Syntax;
use crate::templating::source::{Encoding, default_extensions};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "SWINF_TEMPLATE_CONFIG";

/// Default include nesting limit.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Template engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Reload mode: recompile on every render so file edits show up at once.
    pub debug: bool,
    /// Swap escaping: unmarked `{{ }}` raw, `{{! }}` escaped.
    pub noescape: bool,
    /// Encoding of template files
    pub encoding: Encoding,
    /// Directories searched for named templates, in order
    pub lookup: Vec<PathBuf>,
    /// Extensions tried for each directory; `""` means the bare name
    pub extensions: Vec<String>,
    /// Deepest allowed chain of nested `include` calls
    pub max_include_depth: usize,
    pub syntax: Syntax,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            debug: false,
            noescape: false,
            encoding: Encoding::default(),
            lookup: vec![PathBuf::from("./views")],
            extensions: default_extensions(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            syntax: Syntax::default(),
        }
    }
}

impl TemplateConfig {
    /// Load, expand and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a lookup entry
    /// references an unset variable, or [`TemplateConfig::validate`] fails.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Self = parse_config(path)?;
        config.expand_lookup()?;
        config.validate()?;
        tracing::debug!("Loaded template configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, else from [`CONFIG_ENV_VAR`], else use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when a named configuration file fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Check that the configuration can drive the engine.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Config`] for an empty extension list, a zero include
    /// depth, or invalid directive syntax.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.extensions.is_empty() {
            return Err(TemplateError::Config {
                message: "extensions must list at least one entry (use \"\" for bare names)".to_string(),
            });
        }
        if self.max_include_depth == 0 {
            return Err(TemplateError::Config {
                message: "max_include_depth must be at least 1".to_string(),
            });
        }
        self.syntax.validate()
    }

    /// Expand `~` and environment variables in lookup entries.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Config`] when a referenced variable is not set.
    pub fn expand_lookup(&mut self) -> Result<(), TemplateError> {
        self.lookup = self
            .lookup
            .iter()
            .map(|dir| {
                let raw = dir.to_string_lossy();
                shellexpand::full(&raw).map(|expanded| PathBuf::from(expanded.as_ref())).map_err(|e| {
                    TemplateError::Config {
                        message: format!("cannot expand lookup entry '{raw}': {e}"),
                    }
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}
