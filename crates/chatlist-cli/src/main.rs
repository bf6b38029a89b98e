use std::path::PathBuf;

use anyhow::{Context, Result};
use chatlist_cli::cli::{init_tracing, run, CliConfig, RunOptions};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chatlist")]
#[command(about = "Load a conversation list from a store fixture and print it as JSON")]
struct Cli {
    /// JSON file holding the whole remote tree
    #[arg(long, short = 'f')]
    fixture: PathBuf,

    /// Path to JSON config file (currentUserId, schema, initialLoadTimeoutMs)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Signed-in user id, overrides the config file
    #[arg(long, short = 'u')]
    user: Option<String>,

    /// Filter conversations by partner name
    #[arg(long, short = 's')]
    search: Option<String>,

    /// Delete the conversation with this partner after loading
    #[arg(long, short = 'd')]
    delete: Option<String>,

    /// Treat the network as unreachable
    #[arg(long)]
    offline: bool,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Debug output on stderr
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = CliConfig::resolve(cli.config.as_deref())?;
    let sync_config = config.sync_config(cli.user.as_deref())?;

    let content = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("Failed to read fixture: {}", cli.fixture.display()))?;
    let fixture = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixture: {}", cli.fixture.display()))?;

    let report = run(
        sync_config,
        RunOptions {
            fixture,
            search: cli.search,
            delete: cli.delete,
            offline: cli.offline,
            initial_load_timeout: config.initial_load_timeout(),
        },
    )
    .await?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);
    Ok(())
}
