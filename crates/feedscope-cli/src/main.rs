use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "feedscope")]
#[command(about = "Ask questions about camera feeds and codec parameters")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the feed table and parameter files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// LLM model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Answer a single question and exit
    Ask { question: String },
    /// Interactive chat (the default)
    Chat,
    /// Verify configuration, API key and data files
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Chat);

    let default_filter = match command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(feedscope_core::Settings::config_path);
    let mut settings = match &cli.config {
        Some(path) => feedscope_core::Settings::load_from(path)?,
        None => feedscope_core::Settings::load(),
    };

    if let Some(model) = cli.model {
        settings.llm.model = model;
    }
    if let Some(dir) = cli.data_dir {
        settings.data.dir = dir;
    }

    match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            app::run_serve(settings).await?;
        }
        Command::Ask { question } => app::run_single_question(&settings, &question).await?,
        Command::Chat => app::run_chat(&settings).await?,
        Command::Check => app::run_check(&settings, &config_path)?,
    }

    Ok(())
}
