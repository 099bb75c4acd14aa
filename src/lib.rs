//! swinf-template - the template engine of the swinf micro web framework
//!
//! Templates are plain text with embedded expressions and block directives.
//! The engine compiles each template once into a flat program, caches it, and
//! executes it against caller values to produce a string.
//!
//! # Architecture Overview
//!
//! - A template is referenced by name (resolved through a lookup path of
//!   directories and file extensions) or given as literal source text.
//! - The compiler classifies every line and tag, tracks open blocks on a
//!   stack and emits instructions with jump links between the clauses of a
//!   construct (`if`/`elif`/`else`, `try`/`except`/`finally`, ...).
//! - The executor walks the program, writing text and escaped expression
//!   values to an output buffer and dispatching statements to a pluggable
//!   expression evaluator.
//!
//! # Core Modules
//!
//! - [`templating`] - Compiler, executor, cache and the [`TemplateEngine`](templating::TemplateEngine) facade
//! - [`expr`] - The expression language: parser, interpreter and the [`Evaluator`](expr::Evaluator) seam
//! - [`config`] - Engine configuration loaded from TOML
//! - [`core`] - Error types shared by every layer
//! - [`cli`] - The `swinf-tpl` command-line interface
//!
//! # Template Syntax
//!
//! ```text
//! <h1>{{ title }}</h1>                 escaped value
//! {{! body_html }}                    raw value
//! %% for post in posts:               single-line directive
//!   <li>{{ post.title }}</li>
//! %% else:
//!   <li>No posts yet</li>
//! %% end
//! {% include('footer', year=2024) %}  tag directive
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use swinf_template::templating::TemplateEngine;
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = TemplateEngine::new();
//! let html = engine.render(
//!     "%% for n in names:\n<b>{{ n }}</b>\n%% end\n",
//!     &json!({"names": ["a", "<b>"]}),
//! )?;
//! assert_eq!(html, "<b>a</b>\n<b>&lt;b&gt;</b>\n");
//! # Ok(())
//! # }
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Render a named template with values
//! swinf-tpl render index --lookup ./views --var title=Home
//!
//! # Compile every template in the lookup path
//! swinf-tpl check --lookup ./views
//! ```

// Engine
pub mod config;
pub mod core;
pub mod expr;
pub mod templating;

// Binary support
pub mod cli;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
