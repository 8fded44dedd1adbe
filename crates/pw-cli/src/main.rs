use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use pw_application::TelemetryLayer;
use pw_core::telemetry::TelemetryBus;
use pw_infrastructure::PwPaths;

mod commands;

use commands::context::CliContext;

#[derive(Parser)]
#[command(name = "personaworks")]
#[command(about = "PersonaWorks - character studio and mock chat stage", long_about = None)]
struct Cli {
    /// Keep config, characters and logs under this directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Platform provider: local or perchance
    #[arg(long, global = true)]
    env: Option<String>,

    /// Also write logs to a daily file in the logs directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the prompts a message to a character would produce
    Prompt { character_id: String, text: String },
    /// Import a character bundle into the library
    Import { file: PathBuf },
    /// Export the library as a character bundle
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List saved characters
    List,
    /// List voice archetypes offered by the platform
    Archetypes,
    /// Chat with a character on the Stage
    Chat {
        character_id: String,
        #[arg(required = true)]
        text: Vec<String>,
        /// Complete through the platform instead of echoing
        #[arg(long)]
        ai: bool,
    },
}

fn init_logging(log_dir: Option<PathBuf>, bus: &TelemetryBus) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "personaworks.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .with(TelemetryLayer::new(bus.clone()))
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let bus = TelemetryBus::new();
    let log_dir = if cli.log_file {
        Some(PwPaths::new(cli.data_dir.as_deref()).logs_dir()?)
    } else {
        None
    };
    let _guard = init_logging(log_dir, &bus)?;

    let ctx = CliContext::load(cli.data_dir.as_deref(), cli.env.as_deref()).await?;

    match cli.command {
        Commands::Prompt { character_id, text } => {
            commands::characters::prompt(&ctx, &character_id, &text).await?
        }
        Commands::Import { file } => commands::characters::import(&ctx, &file).await?,
        Commands::Export { out } => commands::characters::export(&ctx, out.as_deref()).await?,
        Commands::List => commands::characters::list(&ctx).await?,
        Commands::Archetypes => commands::characters::archetypes(&ctx).await?,
        Commands::Chat {
            character_id,
            text,
            ai,
        } => commands::chat::run(&ctx, bus, &character_id, &text, ai).await?,
    }

    Ok(())
}
