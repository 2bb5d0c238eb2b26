pub mod config;
pub mod data;
pub mod error;
pub mod filters;
pub mod projection;
pub mod render;
pub mod server;
pub mod summary;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use types::DatasetLabel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the static wildfire trend chart
    Trend {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the dashboard API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Trend { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let records = data::load_dataset(&app_config, &DatasetLabel::Cumulative)?;
            let rows = summary::summarize(&records);
            render::render_trend(&app_config, &rows)?;
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}
