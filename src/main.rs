mod cli;
mod commands;
mod error;
mod mcp;
mod page_range;
mod pdf;
mod session;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to command output and the MCP transport
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pdfslice=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let rasterizer = cli.rasterizer();

    match cli.command {
        Commands::Mcp => {
            mcp::run_server(rasterizer).await?;
        }
        Commands::Info { path } => {
            commands::info::run(&path)?;
        }
        Commands::Extract {
            path,
            pages,
            output,
        } => {
            commands::extract::run(&path, &pages, &output)?;
        }
        Commands::Preview {
            path,
            pages,
            output_dir,
        } => {
            commands::preview::run(&path, &pages, &output_dir, rasterizer).await?;
        }
        Commands::Shell { preview_dir } => {
            commands::shell::run(rasterizer, preview_dir).await?;
        }
    }

    Ok(())
}
