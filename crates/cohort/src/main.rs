mod cli;
mod logging;

use std::process::ExitCode;

use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::Cli::try_parse() {
        Ok(cli) => cli.execute().await,
        Err(e) => cli::print_usage(e),
    }
}
