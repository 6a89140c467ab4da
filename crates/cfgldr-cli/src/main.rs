//! `cfgldr`: resolve a configuration file and print it as JSON.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve a configuration file and print it as JSON
#[derive(Parser, Debug)]
#[command(name = "cfgldr", version)]
#[command(about = "Resolve cfgldr configuration files", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Verify the configuration against this schema file
    #[arg(long, value_name = "SCHEMA")]
    schema: Option<PathBuf>,

    /// Print compact JSON (the default)
    #[arg(long, conflicts_with = "pretty")]
    json: bool,

    /// Print indented JSON
    #[arg(long)]
    pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over -v
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

fn run(args: &Args) -> Result<()> {
    let config = cfgldr::load_config(&args.config, args.schema.as_deref())
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    debug!(keys = config.len(), "configuration loaded");

    let output = if args.pretty {
        serde_json::to_string_pretty(&config)?
    } else {
        serde_json::to_string(&config)?
    };
    println!("{}", output);
    Ok(())
}

/// 2 when the configuration was read but rejected by the schema, 1 otherwise.
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<cfgldr::Error>() {
        Some(e) if e.is_verification() => 2,
        _ => 1,
    }
}
