mod checkpoint;
mod cli;
mod client;
mod config;
mod error;
mod migrator;
mod output;
mod types;

use clap::Parser;
use cli::Cli;
use error::MigratorError;
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting log migrator");

    match cli.execute().await {
        Ok(summary) => {
            output::print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            match e
                .downcast_ref::<MigratorError>()
                .and_then(MigratorError::remaining_pipelines)
            {
                Some(remaining) => eprintln!(
                    "{}",
                    output::failure(format!(
                        "Migration aborted with {remaining} pipelines remaining unprocessed"
                    ))
                ),
                None => eprintln!("{}", output::failure("Migration failed")),
            }
            ExitCode::FAILURE
        }
    }
}
