//! mediaconv: operator CLI.
//!
//! Reads the same environment as the gateway and worker (`DATABASE_URL`,
//! storage settings, `GATEWAY_PUBLIC_ENDPOINT`) and prints JSON.

use anyhow::Context;
use clap::Parser;
use mediaconv_cli::cli::{Cli, Commands, PipelineCommands};
use mediaconv_cli::{commands, init_tracing};
use mediaconv_core::Config;
use mediaconv_services::ServiceContext;
use serde::Serialize;

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Pipelines {
            sub: PipelineCommands::Validate { file, format },
        } => commands::validate_pipeline(&file, format).await?,
        command => {
            let config = Config::from_env()?;
            config.validate().context("Configuration validation failed")?;
            let ctx = ServiceContext::connect(config)
                .await
                .context("Failed to connect to the catalog")?;
            commands::execute(&ctx, command).await?
        }
    };

    print_json(&output)
}
