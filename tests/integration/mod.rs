//! Integration test suite for swinf-template
//!
//! End-to-end tests that go through the public API and the `swinf-tpl`
//! binary, with template trees on disk.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: The `render` and `check` subcommands
//! - **config**: Configuration files driving the engine
//! - **lookup**: Name resolution, includes and reload mode
//! - **rendering**: Complete pages through the engine facade

mod cli;
mod config;
mod lookup;
mod rendering;
