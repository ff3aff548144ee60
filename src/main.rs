use std::process::ExitCode;

use clap::Parser;
use request_chain::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let success = cli::run::run(args).await?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Config => {
            cli::show_config::run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
