//! Expression evaluation boundary.
//!
//! The template compiler never interprets expressions itself. Text inside
//! `{{ }}`, the conditions and iterables of block headers, and plain directive
//! statements are handed to an [`Evaluator`] together with a [`Scope`] that
//! exposes the render environment (names, assignment, callables).
//!
//! [`ExprEvaluator`] is the evaluator used by default. It understands a small
//! Python-flavoured language:
//!
//! ```text
//! user.name            items[0]           d['key']          len(items)
//! a + b * 2            n // 2             'x' in tags       not done
//! a and b or c         'y' if ok else 'n' greet(who='Bob')  ', '.join(names)
//! count = 0            count += 1
//! ```
//!
//! Parsed syntax trees are cached per source string, so a template that is
//! rendered many times parses each expression once.

pub mod ast;
mod eval;
mod lexer;
mod parser;
pub mod value;

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::core::TemplateError;
use ast::{Expr, Stmt};
use eval::Interpreter;

pub use value::{is_truthy, to_text, type_name};

/// Failure raised while evaluating an expression or statement.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Evaluator diagnostic (undefined name, type mismatch, ...)
    #[error("{0}")]
    Message(String),

    /// A nested template operation (such as `include`) failed; propagated as-is.
    #[error(transparent)]
    Template(Box<TemplateError>),
}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for EvalError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<TemplateError> for EvalError {
    fn from(error: TemplateError) -> Self {
        Self::Template(Box::new(error))
    }
}

/// The names an evaluator can see while a template runs.
pub trait Scope {
    /// Value bound to `name`, if any.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Bind `name` to `value`, replacing any previous binding.
    fn assign(&mut self, name: &str, value: Value);

    /// Call the callable bound to `name`.
    ///
    /// Returns `Ok(None)` when no callable of that name exists, so the
    /// evaluator can fall back to its own builtins.
    fn call(
        &mut self,
        name: &str,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> Result<Option<Value>, EvalError>;

    /// All bound names, used for "did you mean" suggestions.
    fn names(&self) -> Vec<String>;
}

/// Pluggable expression evaluator.
///
/// `check_*` run at compile time so syntax errors are reported with a template
/// line number before anything is rendered.
pub trait Evaluator: Send + Sync {
    /// Validate an expression without evaluating it.
    fn check_expression(&self, source: &str) -> Result<(), String>;

    /// Validate a statement without executing it.
    fn check_statement(&self, source: &str) -> Result<(), String>;

    /// Evaluate an expression to a value.
    fn evaluate(&self, source: &str, scope: &mut dyn Scope) -> Result<Value, EvalError>;

    /// Execute a statement for its side effects.
    fn execute(&self, source: &str, scope: &mut dyn Scope) -> Result<(), EvalError>;
}

/// The default [`Evaluator`], with a concurrent parse cache.
#[derive(Debug, Default)]
pub struct ExprEvaluator {
    expressions: DashMap<String, Arc<Expr>>,
    statements: DashMap<String, Arc<Stmt>>,
}

impl ExprEvaluator {
    /// Create an evaluator with an empty parse cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expression(&self, source: &str) -> Result<Arc<Expr>, String> {
        if let Some(expr) = self.expressions.get(source) {
            return Ok(Arc::clone(&expr));
        }
        let expr = Arc::new(parser::parse_expression(source)?);
        self.expressions.insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    fn statement(&self, source: &str) -> Result<Arc<Stmt>, String> {
        if let Some(stmt) = self.statements.get(source) {
            return Ok(Arc::clone(&stmt));
        }
        let stmt = Arc::new(parser::parse_statement(source)?);
        self.statements.insert(source.to_string(), Arc::clone(&stmt));
        Ok(stmt)
    }
}

impl Evaluator for ExprEvaluator {
    fn check_expression(&self, source: &str) -> Result<(), String> {
        self.expression(source).map(|_| ())
    }

    fn check_statement(&self, source: &str) -> Result<(), String> {
        self.statement(source).map(|_| ())
    }

    fn evaluate(&self, source: &str, scope: &mut dyn Scope) -> Result<Value, EvalError> {
        let expr = self.expression(source)?;
        Interpreter::new(scope).eval(&expr)
    }

    fn execute(&self, source: &str, scope: &mut dyn Scope) -> Result<(), EvalError> {
        let stmt = self.statement(source)?;
        Interpreter::new(scope).execute(&stmt)
    }
}
