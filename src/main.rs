//! Goinsight CLI entry point.

use clap::Parser;
use goinsight::cli::{self, Cli, EXIT_ERROR};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
