//! The template engine facade.
//!
//! [`TemplateEngine`] ties the pieces together: it resolves a
//! [`TemplateRef`] through the lookup path, compiles it once into a cached
//! [`Program`], and executes programs against caller values.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use swinf_template::templating::TemplateEngine;
//!
//! # fn example() -> Result<(), swinf_template::core::TemplateError> {
//! let engine = TemplateEngine::new();
//! let page = engine.render(
//!     "Hi {{name}}!{% if show %} Welcome{% endif %}",
//!     &json!({"name": "<Bob>", "show": true}),
//! )?;
//! assert_eq!(page, "Hi &lt;Bob&gt;! Welcome");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Sharing
//!
//! The engine is `Send + Sync`. Share one behind an `Arc` so every request
//! hits the same program cache; each render call builds its own namespace and
//! output, so concurrent renders never observe each other.

use serde_json::{Map, Value};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::TemplateConfig;
use crate::core::TemplateError;
use crate::expr::{Evaluator, ExprEvaluator, type_name};
use crate::templating::cache::{CacheKey, ProgramCache};
use crate::templating::compiler::compile;
use crate::templating::env::{Extensions, Helper, Output};
use crate::templating::escape::{EscapeFn, Formatter, html_escape};
use crate::templating::executor::{self, ExecContext};
use crate::templating::program::Program;
use crate::templating::source::{TemplateRef, TemplateSource};

/// Escaping settings for one render.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Swap which expression form is escaped.
    pub noescape: bool,
    pub escape: EscapeFn,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            noescape: false,
            escape: html_escape,
        }
    }
}

/// How [`TemplateEngine::render_to_path`] opens its destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or truncate
    #[default]
    Write,
    /// Create or append
    Append,
}

/// Per-call overrides. Unset fields fall back to the engine's configuration.
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Evaluator to use instead of the engine's
    pub adapter: Option<Arc<dyn Evaluator>>,
    pub lookup: Option<Vec<PathBuf>>,
    pub settings: Option<Settings>,
    pub mode: Option<WriteMode>,
}

impl RenderOptions {
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn Evaluator>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn with_lookup(mut self, lookup: Vec<PathBuf>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("adapter", &self.adapter.as_ref().map(|_| ".."))
            .field("lookup", &self.lookup)
            .field("settings", &self.settings)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Compiles, caches and renders templates.
pub struct TemplateEngine {
    config: TemplateConfig,
    evaluator: Arc<dyn Evaluator>,
    extensions: Extensions,
    escape: EscapeFn,
    cache: ProgramCache,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("config", &self.config)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl TemplateEngine {
    /// Engine with the default configuration and evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TemplateConfig::default(),
            evaluator: Arc::new(ExprEvaluator::new()),
            extensions: Extensions::new(),
            escape: html_escape,
            cache: ProgramCache::new(),
        }
    }

    /// Engine with a validated configuration.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Config`] when [`TemplateConfig::validate`] fails.
    pub fn from_config(config: TemplateConfig) -> Result<Self, TemplateError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replace the default expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Register a helper visible to every template.
    ///
    /// Values passed to a render call shadow helpers of the same name.
    #[must_use]
    pub fn with_extension<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&mut Output, &[Value]) -> Result<(), String> + Send + Sync + 'static,
    {
        let helper: Helper = Arc::new(helper);
        self.extensions.insert(name.into(), helper);
        self
    }

    /// Replace the escape function used when no per-call settings are given.
    #[must_use]
    pub fn with_escape(mut self, escape: EscapeFn) -> Self {
        self.escape = escape;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &TemplateConfig {
        &self.config
    }

    #[must_use]
    pub const fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    pub(crate) const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// The message to show for `error` under this engine's debug setting.
    #[must_use]
    pub fn public_message(&self, error: &TemplateError) -> String {
        error.public_message(self.config.debug)
    }

    /// Compile (or fetch from the cache) a template under the configured
    /// lookup path.
    pub fn compile(&self, template: impl Into<TemplateRef>) -> Result<Arc<Program>, TemplateError> {
        self.program(&template.into(), &self.config.lookup, self.evaluator.as_ref())
    }

    fn program(
        &self,
        template: &TemplateRef,
        lookup: &[PathBuf],
        evaluator: &dyn Evaluator,
    ) -> Result<Arc<Program>, TemplateError> {
        let key = CacheKey::new(lookup.to_vec(), template.clone());
        self.cache.get_or_compile(&key, self.config.debug, || {
            let source =
                TemplateSource::load(template, lookup, &self.config.extensions, self.config.encoding)?;
            compile(template.identity(), source.text(), &self.config.syntax, evaluator)
        })
    }

    /// Render a template with default options.
    ///
    /// `values` must be a JSON object (or `null` for no values).
    pub fn render(&self, template: impl Into<TemplateRef>, values: &Value) -> Result<String, TemplateError> {
        self.render_with(template, values, &RenderOptions::default())
    }

    /// Render a template with per-call overrides.
    pub fn render_with(
        &self,
        template: impl Into<TemplateRef>,
        values: &Value,
        options: &RenderOptions,
    ) -> Result<String, TemplateError> {
        let template = template.into();
        let values = value_map(values)?;
        let ctx = self.context(options);
        let program = self.program(&template, ctx.lookup, ctx.evaluator)?;
        let mut output = Output::new();
        executor::run(ctx, &program, &mut output, values, 0)?;
        Ok(output.into_string())
    }

    /// Run a compiled program, appending to `output`.
    pub fn execute(
        &self,
        program: &Arc<Program>,
        output: &mut Output,
        values: &Value,
        options: &RenderOptions,
    ) -> Result<(), TemplateError> {
        executor::run(self.context(options), program, output, value_map(values)?, 0)
    }

    /// Resolve `name` and execute it into `output` with a fresh namespace of
    /// `values` plus extensions.
    pub fn include(
        &self,
        name: &str,
        output: &mut Output,
        values: &Value,
        options: &RenderOptions,
    ) -> Result<(), TemplateError> {
        self.include_nested(self.context(options), name, value_map(values)?, output, 1)
    }

    pub(crate) fn include_nested(
        &self,
        ctx: ExecContext<'_>,
        name: &str,
        values: Map<String, Value>,
        output: &mut Output,
        depth: usize,
    ) -> Result<(), TemplateError> {
        let limit = self.config.max_include_depth;
        if depth > limit {
            return Err(TemplateError::IncludeDepthExceeded {
                name: name.to_string(),
                limit,
            });
        }
        tracing::debug!("Including template '{}' at depth {}", name, depth);
        let program = self.program(&TemplateRef::name(name), ctx.lookup, ctx.evaluator)?;
        executor::run(ctx, &program, output, values, depth)
    }

    /// Render and write the result to `path`, truncating or appending per
    /// `options.mode`.
    pub fn render_to_path(
        &self,
        template: impl Into<TemplateRef>,
        values: &Value,
        path: &Path,
        options: &RenderOptions,
    ) -> Result<(), TemplateError> {
        let rendered = self.render_with(template, values, options)?;
        let mode = options.mode.unwrap_or_default();
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(mode == WriteMode::Append)
            .truncate(mode == WriteMode::Write)
            .open(path)
            .and_then(|mut file| file.write_all(rendered.as_bytes()))
            .map_err(|source| TemplateError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("Wrote {} bytes to {} ({:?})", rendered.len(), path.display(), mode);
        Ok(())
    }

    fn context<'a>(&'a self, options: &'a RenderOptions) -> ExecContext<'a> {
        let settings = options.settings.unwrap_or(Settings {
            noescape: self.config.noescape,
            escape: self.escape,
        });
        ExecContext {
            engine: self,
            evaluator: options.adapter.as_deref().unwrap_or(self.evaluator.as_ref()),
            formatter: Formatter::prepare(settings.noescape, settings.escape),
            lookup: options.lookup.as_deref().unwrap_or(&self.config.lookup),
        }
    }
}

fn value_map(values: &Value) -> Result<Map<String, Value>, TemplateError> {
    match values {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(TemplateError::Config {
            message: format!("template values must be an object, got '{}'", type_name(other)),
        }),
    }
}
