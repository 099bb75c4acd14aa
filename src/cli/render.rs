//! Render a template from the command line.
//!
//! Values come from a JSON file (`--values`) and/or `--var key=value` pairs;
//! pairs are applied last, so they override the file. A pair's value is
//! parsed as JSON when it is valid JSON (`--var count=3`, `--var tags=["a"]`)
//! and taken as a string otherwise.
//!
//! ```bash
//! swinf-tpl render page --lookup ./views --values page.json --var title=Home
//! swinf-tpl render --inline '{% for x in xs %}<{{x}}>{% end %}' --var 'xs=[1,2]'
//! swinf-tpl render page -o public/page.html --append
//! ```

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::PathBuf;

use super::{apply_lookup, display_path};
use crate::config::TemplateConfig;
use crate::templating::{RenderOptions, TemplateEngine, TemplateRef, WriteMode};

/// Arguments for `swinf-tpl render`.
#[derive(Args, Debug, Default)]
pub struct RenderCommand {
    /// Template name, resolved through the lookup path
    pub template: String,

    /// Treat TEMPLATE as template source text instead of a name
    #[arg(long)]
    pub inline: bool,

    /// Lookup directory (repeatable); replaces the configured lookup path
    #[arg(short, long = "lookup", value_name = "DIR")]
    pub lookup: Vec<PathBuf>,

    /// JSON file holding an object of template values
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// Template value as KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Write {{ }} values raw and escape {{! }} instead
    #[arg(long)]
    pub noescape: bool,

    /// Write the output to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of truncating it
    #[arg(long, requires = "output")]
    pub append: bool,
}

impl RenderCommand {
    pub fn execute(self, mut config: TemplateConfig) -> Result<()> {
        apply_lookup(&mut config, &self.lookup)?;
        config.noescape |= self.noescape;

        let values = self.collect_values()?;
        let template = if self.inline {
            TemplateRef::source(self.template.clone())
        } else {
            TemplateRef::name(self.template.clone())
        };
        let engine = TemplateEngine::from_config(config)?;
        tracing::debug!("Rendering {} with {} value(s)", template, values.len());

        let values = Value::Object(values);
        match &self.output {
            Some(path) => {
                let mode = if self.append { WriteMode::Append } else { WriteMode::Write };
                let options = RenderOptions::default().with_mode(mode);
                engine.render_to_path(template, &values, path, &options)?;
                tracing::info!("Wrote {}", display_path(path));
            }
            None => {
                let rendered = engine.render(template, &values)?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(rendered.as_bytes()).context("Failed to write to stdout")?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Values from `--values`, then `--var` pairs on top.
    pub fn collect_values(&self) -> Result<Map<String, Value>> {
        let mut values = match &self.values {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read values file: {}", path.display()))?;
                let parsed: Value = serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse values file: {}", path.display()))?;
                match parsed {
                    Value::Object(map) => map,
                    other => {
                        return Err(anyhow!(
                            "Values file {} must hold a JSON object, found {}",
                            path.display(),
                            json_kind(&other)
                        ));
                    }
                }
            }
            None => Map::new(),
        };

        for pair in &self.vars {
            let (key, raw) = parse_var(pair)?;
            values.insert(key.to_string(), raw);
        }
        Ok(values)
    }
}

/// Split `KEY=VALUE`, parsing the value as JSON when possible.
pub fn parse_var(pair: &str) -> Result<(&str, Value)> {
    let (key, raw) = pair.split_once('=').ok_or_else(|| anyhow!("Invalid --var '{pair}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid --var '{pair}': empty key"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
