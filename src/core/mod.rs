//! Core types shared by every layer of the engine.
//!
//! At the moment this is the error vocabulary: [`TemplateError`] and its
//! [`ErrorKind`], plus the CLI-oriented [`ErrorContext`].

pub mod error;

pub use error::{
    ErrorContext, ErrorKind, GENERIC_FAILURE_MESSAGE, TemplateError, user_friendly_error,
};

/// Result alias used throughout the crate.
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;
