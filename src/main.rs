use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use looper::agent::AgentRuntime;
use looper::channels::ReplChannel;
use looper::cli::{Cli, Command, run_doctor_command, run_init_command};
use looper::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command() {
        Command::Doctor { strict } => {
            run_doctor_command(cli.config_path(), cli.character_path(), strict).await
        }
        Command::Init {
            xtreamly_api_key,
            openai_api_key,
        } => run_init_command(
            cli.config_path(),
            xtreamly_api_key.as_deref(),
            openai_api_key.as_deref(),
        ),
        Command::Run { message } => run_channel(&cli, ReplChannel::with_message(message)).await,
        Command::Repl => run_channel(&cli, ReplChannel::new()).await,
    }
}

async fn run_channel(cli: &Cli, channel: ReplChannel) -> anyhow::Result<()> {
    let config = Config::load(cli.config_path(), cli.character_path())?;
    if !config.xtreamly.api_key_configured() {
        tracing::warn!("XTREAMLY_API_KEY is not set; volatility queries are disabled");
    }

    let runtime = Arc::new(AgentRuntime::from_config(&config)?);
    tracing::info!(
        character = %config.character.name,
        model = %config.llm.model,
        actions = runtime.actions().len(),
        "Looper ready"
    );

    channel.run(runtime).await
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("looper=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
