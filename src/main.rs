//! swinf-tpl CLI entry point
//!
//! Parses arguments, runs the command and turns failures into a colored
//! error report with a suggestion where one applies:
//! - `render` - Render a template to stdout or a file
//! - `check` - Compile templates and report errors

use anyhow::Result;
use clap::Parser;
use swinf_template::cli;
use swinf_template::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
