use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use murmur_channels::{ChannelBot, DiscordBot};
use murmur_core::{MainConfig, Orchestrator, OrchestratorSettings, Persona};
use murmur_memory::MemoryStore;
use murmur_provider::create_provider;

#[derive(Parser)]
#[command(name = "murmur", version, about = "murmur persona agent for group chats")]
struct Cli {
    #[arg(long, default_value = "murmur.yaml", help = "Path to the config file")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Connect to the chat platform and run the agent")]
    Start,
    #[command(about = "Validate the config file")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = MainConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Validate => {
            config.validate()?;
            println!("config ok: {}", cli.config.display());
            Ok(())
        }
        Commands::Start => start(config).await,
    }
}

async fn start(config: MainConfig) -> Result<()> {
    config.validate()?;

    let store = Arc::new(
        MemoryStore::open(&config.memory.db_path)
            .with_context(|| format!("opening memory store at {}", config.memory.db_path))?,
    );
    let provider = create_provider(&config.provider.resolved())?;
    let persona = Persona::load(&config.app.name, config.agent.persona_path.as_deref())?;

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        provider,
        persona,
        OrchestratorSettings::from_config(&config),
    ));

    if !config.discord.enabled {
        bail!("no channel enabled; enable discord in the config");
    }
    let token = config
        .discord
        .resolved_token()
        .context("discord token missing")?;

    tracing::info!("starting {} on discord", config.app.name);
    let bot = DiscordBot::new(token, orchestrator);
    Box::new(bot).run().await
}
