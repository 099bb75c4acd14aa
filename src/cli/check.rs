//! Compile templates without rendering them.
//!
//! With template names, each is resolved through the lookup path. Without,
//! every file under the lookup directories whose extension is configured is
//! compiled. Failures are reported together; the command fails if any
//! template does.
//!
//! ```bash
//! swinf-tpl check --lookup ./views
//! swinf-tpl check index layout --listing
//! ```

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::{apply_lookup, display_path};
use crate::config::TemplateConfig;
use crate::core::TemplateError;
use crate::expr::ExprEvaluator;
use crate::templating::{Program, TemplateEngine, TemplateRef, TemplateSource, compile};

/// Arguments for `swinf-tpl check`.
#[derive(Args, Debug, Default)]
pub struct CheckCommand {
    /// Template names to check; all templates in the lookup path when omitted
    pub templates: Vec<String>,

    /// Lookup directory (repeatable); replaces the configured lookup path
    #[arg(short, long = "lookup", value_name = "DIR")]
    pub lookup: Vec<PathBuf>,

    /// Print the compiled program of each template
    #[arg(long)]
    pub listing: bool,
}

/// Outcome of compiling one template.
struct Checked {
    label: String,
    result: Result<Arc<Program>, TemplateError>,
}

impl CheckCommand {
    pub fn execute(self, mut config: TemplateConfig) -> Result<()> {
        apply_lookup(&mut config, &self.lookup)?;

        let checked = if self.templates.is_empty() {
            check_tree(&config)
        } else {
            let engine = TemplateEngine::from_config(config)?;
            self.templates
                .iter()
                .map(|name| Checked {
                    label: name.clone(),
                    result: engine.compile(TemplateRef::name(name.as_str())),
                })
                .collect()
        };

        if checked.is_empty() {
            println!("{} No templates found", "⚠".yellow());
            return Ok(());
        }

        let mut failures = 0usize;
        for Checked {
            label,
            result,
        } in &checked
        {
            match result {
                Ok(program) => {
                    println!("{} {} ({} instructions)", "✓".green(), label, program.len());
                    if self.listing {
                        print!("{}", program.listing());
                    }
                }
                Err(error) => {
                    failures += 1;
                    println!("{} {}", "✗".red(), label);
                    println!("  {}", error.to_string().red());
                }
            }
        }

        if failures > 0 {
            return Err(anyhow!("{failures} of {} template(s) failed to compile", checked.len()));
        }
        tracing::debug!("Checked {} template(s)", checked.len());
        Ok(())
    }
}

/// Compile every template file found under the lookup directories.
fn check_tree(config: &TemplateConfig) -> Vec<Checked> {
    let evaluator = ExprEvaluator::new();
    let mut checked = Vec::new();
    for dir in &config.lookup {
        if !dir.is_dir() {
            tracing::warn!("Lookup directory {} does not exist", display_path(dir));
            continue;
        }
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_template_file(path, &config.extensions))
            .collect();
        files.sort();

        for path in files {
            let label = display_path(path.strip_prefix(dir).unwrap_or(&path));
            let result = TemplateSource::from_file(&path, config.encoding)
                .and_then(|source| compile(&label, source.text(), &config.syntax, &evaluator))
                .map(Arc::new);
            checked.push(Checked {
                label,
                result,
            });
        }
    }
    checked
}

/// Hidden files are skipped; extensionless files count only when `""` is a
/// configured extension.
fn is_template_file(path: &Path, extensions: &[String]) -> bool {
    let hidden = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('.'));
    if hidden {
        return false;
    }
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    extensions.iter().any(|e| e == extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_template_file() {
        let extensions = vec![String::new(), "tpl".to_string()];
        assert!(is_template_file(Path::new("views/page.tpl"), &extensions));
        assert!(is_template_file(Path::new("views/page"), &extensions));
        assert!(!is_template_file(Path::new("views/page.md"), &extensions));
        assert!(!is_template_file(Path::new("views/.page.tpl"), &extensions));
        assert!(!is_template_file(Path::new("views/page"), &["tpl".to_string()]));
    }
}
