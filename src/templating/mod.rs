//! Template compilation and execution.
//!
//! A template is literal text with two kinds of markup:
//!
//! - `{{ expr }}` substitutes the value of an expression, HTML-escaped;
//!   `{{! expr }}` substitutes it raw.
//! - Directives control flow. A line whose first non-blank characters are
//!   `%%` is a single-line directive; `{% ... %}` tags may sit inline in text
//!   or span several lines, one statement per line.
//!
//! ```text
//! <h1>{{ title }}</h1>
//! %% for item in items:
//!   <li>{{ item.name }}</li>
//! %% else:
//!   <li>nothing here</li>
//! %% end
//! {% include('footer', year=2024) %}
//! ```
//!
//! # Blocks
//!
//! `if`, `elif`, `else`, `for`, `while`, `try`, `except`, `finally`, `with`,
//! `def` and `class` open or continue blocks. Indentation is irrelevant: a
//! block ends at any directive starting with `end` (`end`, `endif`,
//! `endfor`, ...), and `elif`/`else`/`except`/`finally` close the clause
//! above them. The trailing `:` is optional. Text after the colon makes a
//! one-liner that needs no end marker:
//!
//! ```text
//! %% if user.admin: include('admin_bar')
//! ```
//!
//! A directive line ending in `\` continues on the next line.
//!
//! # Pipeline
//!
//! 1. [`source`] resolves a [`TemplateRef`] to text through the lookup path.
//! 2. [`compiler`] turns the text into a [`Program`], using [`tokenizer`]
//!    for `{{ }}` and [`directive`] for classification and headers.
//! 3. [`cache`] keeps programs keyed by reference and lookup path.
//! 4. [`executor`] runs a program against a [`Namespace`] and writes to an
//!    [`Output`], formatting values with [`escape`].
//!
//! [`TemplateEngine`] is the entry point for all of it.

pub mod cache;
pub mod compiler;
pub mod directive;
pub mod engine;
pub mod env;
pub mod escape;
pub mod executor;
pub mod program;
pub mod source;
pub mod tokenizer;


pub use cache::{CacheKey, CacheStats, ProgramCache};
pub use compiler::compile;
pub use directive::{DirectiveKind, Syntax};
pub use engine::{RenderOptions, Settings, TemplateEngine, WriteMode};
pub use env::{Binding, Extensions, Helper, Namespace, Output};
pub use escape::{EscapeFn, Formatter, html_escape};
pub use executor::BUILTINS;
pub use program::{Clause, Fragment, Instruction, Op, Program};
pub use source::{Encoding, TemplateRef, TemplateSource};
pub use tokenizer::{Token, Tokens, tokenize};
