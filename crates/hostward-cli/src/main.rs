//! hostward - host trustworthiness assessment

use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match hostward_cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::from(hostward_cli::EXIT_ERROR)
        }
    }
}
