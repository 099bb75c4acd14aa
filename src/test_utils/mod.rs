//! Test utilities for swinf-template
//!
//! Helpers shared by unit tests and the integration suite: one-time logging
//! setup and a temporary template tree that can back a lookup path.
//!
//! # Example
//!
//! ```rust,no_run
//! use swinf_template::templating::TemplateRef;
//! use swinf_template::test_utils::TemplateDir;
//!
//! # fn example() -> anyhow::Result<()> {
//! let views = TemplateDir::new()?
//!     .with_template("footer.tpl", "(c) {{year}}")?
//!     .with_template("pages/index.tpl", "{% include('footer', year=2024) %}")?;
//! let engine = views.engine(false)?;
//! assert_eq!(engine.render(TemplateRef::name("pages/index"), &serde_json::Value::Null)?, "(c) 2024");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::TemplateConfig;
use crate::templating::TemplateEngine;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` unset the `RUST_LOG`
/// environment variable decides; with neither, tests stay silent.
///
/// ```bash
/// RUST_LOG=swinf_template=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A temporary directory of template files, removed on drop.
pub struct TemplateDir {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    root: PathBuf,
}

impl TemplateDir {
    /// Create an empty template directory.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create template directory")?;
        let root = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn with_template(self, relative: &str, contents: &str) -> Result<Self> {
        self.write(relative, contents)?;
        Ok(self)
    }

    /// Write or overwrite a template file.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write template {}", path.display()))?;
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Default configuration with this directory as the only lookup entry.
    pub fn config(&self) -> TemplateConfig {
        TemplateConfig {
            lookup: vec![self.root.clone()],
            ..TemplateConfig::default()
        }
    }

    /// Engine over this directory, optionally in reload mode.
    pub fn engine(&self, debug: bool) -> Result<TemplateEngine> {
        let config = TemplateConfig {
            debug,
            ..self.config()
        };
        Ok(TemplateEngine::from_config(config)?)
    }
}
