//! docdeps CLI entry point
//!
//! Parses arguments, runs the command and renders errors with
//! suggestions. Exits with the code of the command run by `docdeps exec`.

use anyhow::Result;
use clap::Parser;
use docdeps::cli;
use docdeps::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
