//! Terminal front end for the Su Tang galgame.
//!
//! ```bash
//! cargo run -p galgame -- --locations config/locations.toml --saves saves
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--verbose` for more detail.

mod repl;

use clap::Parser;
use galgame_core::{GameSession, SessionConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "galgame")]
#[command(about = "Chat your way through a school romance with Su Tang")]
#[command(version)]
struct Cli {
    /// Map file
    #[arg(long, default_value = "config/locations.toml")]
    locations: PathBuf,

    /// Directory for save slots
    #[arg(long, default_value = "saves")]
    saves: PathBuf,

    /// Directory with analysis.txt / summarize.txt overrides
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Model name
    #[arg(short, long, env = "DEEPSEEK_MODEL")]
    model: Option<String>,

    /// Resume from a save slot
    #[arg(short, long)]
    load: Option<String>,

    /// Skip the scene-setting narration at the start of the story
    #[arg(long)]
    no_intro: bool,

    /// Seed for random events
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if std::env::var("DEEPSEEK_API_KEY").is_err() {
        eprintln!("Error: DEEPSEEK_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export DEEPSEEK_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let mut config = SessionConfig::new()
        .with_locations_path(cli.locations)
        .with_save_dir(cli.saves)
        .with_intro_turn(!cli.no_intro);
    if let Some(dir) = cli.prompts {
        config = config.with_prompt_dir(dir);
    }
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let session = GameSession::new(config)?;
    repl::run(session, cli.load).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "galgame=debug,galgame_core=debug"
    } else {
        "galgame=info,galgame_core=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
