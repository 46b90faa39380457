use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use target_lock::logging::init_logging;
use target_lock::replay::replay;
use target_lock::{load_config, AppConfig, LockEngine};

#[derive(Parser)]
#[command(name = "target-lock", version)]
#[command(about = "Decide which tracked objects to lock on, frame by frame")]
struct Cli {
    /// Config file (default: ./target_lock.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines tracker stream and emit lock decisions
    Replay {
        /// Input stream, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg: AppConfig = load_config(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(p) => format!("Failed to load config from {}", p.display()),
            None => "Failed to load config".to_string(),
        })?;

    init_logging(&cfg.logging);

    match cli.command {
        Command::Replay { input, output } => {
            let reader: Box<dyn io::BufRead> = if input == "-" {
                Box::new(io::stdin().lock())
            } else {
                let file = File::open(&input).with_context(|| format!("Cannot open {}", input))?;
                Box::new(BufReader::new(file))
            };

            let writer: Box<dyn io::Write> = match &output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Cannot create {}", path.display()))?;
                    Box::new(BufWriter::new(file))
                }
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };

            let mut engine = LockEngine::new(cfg.lock.clone());
            let summary = replay(&mut engine, reader, writer)?;
            tracing::info!(
                "Processed {} frames, {} locked decisions, peak {} concurrent locks",
                summary.frames,
                summary.locked_decisions,
                summary.peak_active_locks
            );
        }

        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}
