//! Error handling for swinf-template
//!
//! Every failure the engine can report to its host is a [`TemplateError`]. The
//! host framework decides how much of it to show: in development it renders the
//! full diagnostic, in production a generic message (see
//! [`TemplateError::public_message`]). To make that choice possible each variant
//! keeps its kind, a readable message and the identity of the template that
//! failed.
//!
//! # Error Categories
//!
//! - **Loading**: [`TemplateError::SourceMissing`], [`TemplateError::ResolutionFailed`],
//!   [`TemplateError::ReadFailed`]
//! - **Output**: [`TemplateError::WriteFailed`]
//! - **Compilation**: [`TemplateError::UnbalancedBlock`], [`TemplateError::Syntax`]
//! - **Execution**: [`TemplateError::ExpressionFailed`],
//!   [`TemplateError::IncludeDepthExceeded`]
//! - **Setup**: [`TemplateError::Config`]
//!
//! For the CLI, [`user_friendly_error`] turns any [`anyhow::Error`] into an
//! [`ErrorContext`] with a suggestion and colored output.
//!
//! # Examples
//!
//! ```rust,no_run
//! use swinf_template::core::{ErrorKind, TemplateError};
//!
//! fn classify(error: &TemplateError) -> &'static str {
//!     match error.kind() {
//!         ErrorKind::ResolutionFailed => "missing template",
//!         ErrorKind::UnbalancedBlock | ErrorKind::Syntax => "broken template",
//!         _ => "render failure",
//!     }
//! }
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Message substituted for every failure when the host runs in production mode.
pub const GENERIC_FAILURE_MESSAGE: &str = "Template rendering failed";

/// The single error type surfaced by template loading, compilation and rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Neither inline source text nor a template name was given.
    #[error("No template specified")]
    SourceMissing,

    /// The name did not match a file in any lookup directory / extension pair.
    #[error("Template '{name}' not found in lookup path [{}]", display_lookup(lookup))]
    ResolutionFailed {
        /// The name that was searched for
        name: String,
        /// The directories that were probed, in order
        lookup: Vec<PathBuf>,
    },

    /// A template file was found but could not be read or decoded.
    #[error("Failed to read template '{}'", path.display())]
    ReadFailed {
        /// The resolved file path
        path: PathBuf,
        /// The underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Rendered output could not be written to its destination file.
    #[error("Failed to write rendered output to '{}'", path.display())]
    WriteFailed {
        /// The destination path
        path: PathBuf,
        /// The underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A dedent or end marker had no open block, or a block was never closed.
    #[error("Unbalanced block in {template} at line {line}: {message}")]
    UnbalancedBlock {
        /// Identity of the template being compiled
        template: String,
        /// 1-based source line of the offending directive
        line: usize,
        /// What was unbalanced
        message: String,
    },

    /// A directive or expression could not be parsed.
    #[error("Syntax error in {template} at line {line}: {message}")]
    Syntax {
        /// Identity of the template being compiled
        template: String,
        /// 1-based source line
        line: usize,
        /// Parser diagnostic
        message: String,
    },

    /// The expression evaluator failed while running a statement.
    #[error("Expression failed in {template} at line {line}: {message}")]
    ExpressionFailed {
        /// Identity of the template being executed
        template: String,
        /// 1-based source line of the statement
        line: usize,
        /// The expression or statement text that failed
        expression: String,
        /// Evaluator diagnostic
        message: String,
    },

    /// Nested `include` calls went deeper than the configured limit.
    #[error("Include depth limit of {limit} exceeded while including '{name}'")]
    IncludeDepthExceeded {
        /// The template that would have exceeded the limit
        name: String,
        /// The configured limit
        limit: usize,
    },

    /// Engine configuration is invalid (unknown encoding, bad syntax markers, ...).
    #[error("Template configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },
}

/// Discriminant of [`TemplateError`], convenient for matching and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceMissing,
    ResolutionFailed,
    ReadFailed,
    WriteFailed,
    UnbalancedBlock,
    Syntax,
    ExpressionFailed,
    IncludeDepthExceeded,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SourceMissing => "source-missing",
            Self::ResolutionFailed => "resolution-failed",
            Self::ReadFailed => "read-failed",
            Self::WriteFailed => "write-failed",
            Self::UnbalancedBlock => "unbalanced-block",
            Self::Syntax => "syntax",
            Self::ExpressionFailed => "expression-failed",
            Self::IncludeDepthExceeded => "include-depth-exceeded",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

impl TemplateError {
    /// The kind of failure, independent of its message.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceMissing => ErrorKind::SourceMissing,
            Self::ResolutionFailed {
                ..
            } => ErrorKind::ResolutionFailed,
            Self::ReadFailed {
                ..
            } => ErrorKind::ReadFailed,
            Self::WriteFailed {
                ..
            } => ErrorKind::WriteFailed,
            Self::UnbalancedBlock {
                ..
            } => ErrorKind::UnbalancedBlock,
            Self::Syntax {
                ..
            } => ErrorKind::Syntax,
            Self::ExpressionFailed {
                ..
            } => ErrorKind::ExpressionFailed,
            Self::IncludeDepthExceeded {
                ..
            } => ErrorKind::IncludeDepthExceeded,
            Self::Config {
                ..
            } => ErrorKind::Config,
        }
    }

    /// Identity of the template the error originated in, when known.
    ///
    /// File templates are identified by their name, inline templates by
    /// `<inline>`.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        match self {
            Self::ResolutionFailed {
                name,
                ..
            }
            | Self::IncludeDepthExceeded {
                name,
                ..
            } => Some(name),
            Self::UnbalancedBlock {
                template,
                ..
            }
            | Self::Syntax {
                template,
                ..
            }
            | Self::ExpressionFailed {
                template,
                ..
            } => Some(template),
            Self::ReadFailed {
                path,
                ..
            } => path.to_str(),
            Self::SourceMissing
            | Self::WriteFailed {
                ..
            }
            | Self::Config {
                ..
            } => None,
        }
    }

    /// 1-based source line, for compile and execution failures.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::UnbalancedBlock {
                line,
                ..
            }
            | Self::Syntax {
                line,
                ..
            }
            | Self::ExpressionFailed {
                line,
                ..
            } => Some(*line),
            _ => None,
        }
    }

    /// The message a host should show to its users.
    ///
    /// With `debug` set the full diagnostic (including the source chain) is
    /// returned; otherwise [`GENERIC_FAILURE_MESSAGE`].
    #[must_use]
    pub fn public_message(&self, debug: bool) -> String {
        if !debug {
            return GENERIC_FAILURE_MESSAGE.to_string();
        }
        let mut message = self.to_string();
        if let Self::ExpressionFailed {
            expression,
            ..
        } = self
        {
            message.push_str(&format!("\n  in: {}", expression.trim()));
        }
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        message
    }
}

fn display_lookup(lookup: &[PathBuf]) -> String {
    lookup.iter().map(|dir| dir.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Error wrapper that adds a suggestion and details for CLI display.
///
/// # Examples
///
/// ```rust,no_run
/// use swinf_template::core::ErrorContext;
///
/// let context = ErrorContext::new("Template 'index' not found")
///     .with_suggestion("Pass --lookup with the directory that contains the template");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The main error message
    pub message: String,
    /// Kind of the underlying template error, when there is one
    pub kind: Option<ErrorKind>,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context holding only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            suggestion: None,
            details: None,
        }
    }

    /// Attach the template error kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`TemplateError`], [`std::io::Error`], [`toml::de::Error`] and
/// [`serde_json::Error`] anywhere in the error chain; everything else is shown
/// with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(template_error) = error.chain().find_map(|e| e.downcast_ref::<TemplateError>()) {
        return create_error_context(template_error);
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(format!("Invalid configuration file: {toml_error}"))
            .with_kind(ErrorKind::Config)
            .with_suggestion("Check the TOML syntax of the configuration file");
    }

    if let Some(json_error) = error.chain().find_map(|e| e.downcast_ref::<serde_json::Error>()) {
        return ErrorContext::new(format!("{error}"))
            .with_details(json_error.to_string())
            .with_suggestion("Template values must be a JSON object, e.g. {\"name\": \"Bob\"}");
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(error.to_string())
            .with_suggestion("Check the file permissions of the template and output paths");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    ErrorContext::new(message)
}

fn create_error_context(error: &TemplateError) -> ErrorContext {
    let context = ErrorContext::new(error.public_message(true)).with_kind(error.kind());
    match error {
        TemplateError::SourceMissing => {
            context.with_suggestion("Pass a template name, or --inline with the template text")
        }
        TemplateError::ResolutionFailed {
            ..
        } => context
            .with_suggestion("Add the directory containing the template with --lookup")
            .with_details("Each lookup directory is probed with the extensions \"\", \"tpl\" and \"shtml\" unless configured otherwise"),
        TemplateError::ReadFailed {
            ..
        } => context.with_suggestion("Check that the file is readable and uses the configured encoding"),
        TemplateError::WriteFailed {
            ..
        } => context.with_suggestion("Check that the output directory exists and is writable"),
        TemplateError::UnbalancedBlock {
            ..
        } => context
            .with_suggestion("Close every block with an end marker such as {% endif %} or %% endfor")
            .with_details("elif/else/except/finally continue the block above them; end* markers close it"),
        TemplateError::Syntax {
            ..
        } => context.with_suggestion("Check the expression syntax inside {{ }}, {% %} or the %% line"),
        TemplateError::ExpressionFailed {
            ..
        } => context.with_suggestion("Check that every variable used by the template is passed in its values"),
        TemplateError::IncludeDepthExceeded {
            ..
        } => context.with_suggestion("Look for templates that include each other in a cycle"),
        TemplateError::Config {
            ..
        } => context.with_suggestion("Check the configuration file passed with --config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_template_identity() {
        let error = TemplateError::UnbalancedBlock {
            template: "page".to_string(),
            line: 3,
            message: "end marker 'endif' without an open block".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::UnbalancedBlock);
        assert_eq!(error.template(), Some("page"));
        assert_eq!(error.line(), Some(3));
        assert!(error.to_string().contains("line 3"));
    }

    #[test]
    fn test_public_message_hides_details_in_production() {
        let error = TemplateError::ExpressionFailed {
            template: "<inline>".to_string(),
            line: 1,
            expression: "user.name".to_string(),
            message: "name 'user' is not defined".to_string(),
        };
        assert_eq!(error.public_message(false), GENERIC_FAILURE_MESSAGE);
        let debug = error.public_message(true);
        assert!(debug.contains("name 'user' is not defined"));
        assert!(debug.contains("in: user.name"));
    }

    #[test]
    fn test_public_message_includes_io_cause() {
        let error = TemplateError::ReadFailed {
            path: PathBuf::from("views/index.tpl"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let debug = error.public_message(true);
        assert!(debug.contains("views/index.tpl"));
        assert!(debug.contains("caused by: denied"));
    }

    #[test]
    fn test_resolution_failed_lists_lookup() {
        let error = TemplateError::ResolutionFailed {
            name: "footer".to_string(),
            lookup: vec![PathBuf::from("./views"), PathBuf::from("/srv/tpl")],
        };
        assert_eq!(error.to_string(), "Template 'footer' not found in lookup path [./views, /srv/tpl]");
    }

    #[test]
    fn test_user_friendly_error_finds_template_error_in_chain() {
        let error = anyhow::Error::new(TemplateError::SourceMissing).context("rendering page");
        let context = user_friendly_error(error);
        assert_eq!(context.kind, Some(ErrorKind::SourceMissing));
        assert!(context.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let context = user_friendly_error(error);
        assert!(context.message.contains("Caused by:"));
        assert!(context.message.contains("root cause"));
    }
}
