//! chatbot: terminal chat whose model can call tools served by MCP servers

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chatbot_cli::agent::prompt::load_system_prompt;
use chatbot_cli::agent::AgentConfig;
use chatbot_cli::config::{AgentSection, UserConfig};
use chatbot_cli::events::TracingSink;
use chatbot_cli::mcp;
use chatbot_cli::session::{print_tools, ChatSession};
use clap::{Parser, Subcommand};
use llm_core::{ChatClient, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chatbot")]
#[command(about = "Chat with a language model that can use MCP tools", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file listing MCP servers (overrides SERVER_CONFIG_FILE)
    #[arg(long, global = true)]
    server_config: Option<PathBuf>,

    /// Completion requests allowed per user message
    #[arg(long, global = true)]
    max_rounds: Option<usize>,

    /// File containing the system prompt
    #[arg(long, global = true)]
    system_prompt: Option<PathBuf>,

    /// Model to use (overrides LLM_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,

    /// Answer one question and exit
    Ask {
        /// The prompt to send
        #[arg(required = true)]
        prompt: Vec<String>,
    },

    /// List the tools offered by the configured servers
    Tools,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let llm = Config::from_env();
    let user_config = UserConfig::load().unwrap_or_else(|e| {
        warn!("Ignoring user config: {:#}", e);
        UserConfig::default()
    });
    let settings = user_config.agent.overridden_by(AgentSection {
        max_rounds: cli.max_rounds,
        system_prompt_file: cli.system_prompt.clone(),
        model: cli.model.clone(),
    });

    let llm = match settings.model {
        Some(model) => llm.with_model(model),
        None => llm,
    };
    let agent_config = match settings.max_rounds {
        Some(max) => AgentConfig::default().with_max_rounds(max),
        None => AgentConfig::default(),
    };
    let system_prompt = load_system_prompt(settings.system_prompt_file.as_deref())?;

    let server_file = cli.server_config.clone().or_else(|| llm.server_config_file.clone());
    let servers = mcp::load_servers(server_file.as_deref())?;

    let client = ChatClient::new(&llm).context("Failed to create completion client")?;
    info!(
        source = %llm.source,
        model = %llm.model,
        servers = servers.len(),
        "Starting chatbot"
    );

    let mut session = ChatSession::start(
        Arc::new(client),
        mcp::provider_set(servers),
        agent_config,
        system_prompt,
        Arc::new(TracingSink),
    )
    .await?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current request");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let result = run_command(&mut session, cli.command, &interrupted).await;

    session.shutdown().await;
    result
}

async fn run_command(
    session: &mut ChatSession,
    command: Option<Commands>,
    interrupted: &AtomicBool,
) -> Result<()> {
    match command.unwrap_or(Commands::Chat) {
        Commands::Chat => session.run_interactive(interrupted).await,
        Commands::Ask { prompt } => {
            let outcome = session.ask(&prompt.join(" ")).await;
            println!("{}", outcome.final_message());
            Ok(())
        }
        Commands::Tools => {
            print_tools(session.tools());
            Ok(())
        }
    }
}
