use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::tools;
use crate::core::AppConfig;
use crate::openai::BoxedToolCall;
use crate::store::InMemoryStore;

pub mod call;

#[derive(Subcommand)]
enum Command {
    /// Print the tool definitions as JSON
    Tools {},
    /// Invoke a tool with JSON arguments and print its response
    Call {
        #[arg(long)]
        tool: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_tools(config: &AppConfig) -> Result<Vec<BoxedToolCall>> {
    let store = InMemoryStore::from_path(&config.store_path)?;
    Ok(tools::all(Arc::new(store), config))
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();
    let config = AppConfig::default();

    match args.command {
        Some(Command::Tools {}) => {
            let tools = load_tools(&config)?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Some(Command::Call { tool, args }) => {
            let tools = load_tools(&config)?;
            let out = call::run(&tools, &tool, &args)
                .await?
                .ok_or_else(|| anyhow!("Unknown tool: {tool}"))?;
            println!("{out}");
        }
        None => {}
    }

    Ok(())
}
