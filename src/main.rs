use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    finder::logging::init().context("init logging")?;

    let cli = finder::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        finder::cli::Command::Build(args) => {
            finder::generator::run(args).await.context("build")?;
        }
        finder::cli::Command::Index(args) => {
            finder::indexer::run(args).await.context("index")?;
        }
    }

    Ok(())
}
