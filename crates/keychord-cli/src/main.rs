//! keychord CLI
//!
//! Validate bindings files, replay key scripts against them, or feed keys in
//! live on stdin.

mod listen;
mod script;
mod session;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use keychord_config::{parse_config, BindingsConfig};
use keychord_core::{ManualClock, SystemClock};
use miette::{Context, IntoDiagnostic};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::script::{parse_script, Command};
use crate::session::Session;

#[derive(Parser, Debug)]
#[command(name = "keychord")]
#[command(about = "Keyboard combo, sequence and counter recognition")]
#[command(version)]
struct Cli {
    /// Path to the bindings file
    #[arg(short, long, default_value = keychord_config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the bindings file
    Check {
        /// Print the parsed bindings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a key script against the bindings with simulated time
    Replay {
        /// Script file, one command per line
        script: PathBuf,

        /// Emit one JSON object per step
        #[arg(long)]
        json: bool,
    },

    /// Read key commands from stdin and report combos as they fire
    Listen {
        /// Emit one JSON object per step
        #[arg(long)]
        json: bool,
    },
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber. `RUST_LOG` wins, then `--verbose`; otherwise the
/// filter starts at `warn` and may be replaced by the bindings file.
fn init_tracing(verbose: u8) -> Option<FilterHandle> {
    let (filter, fixed) = match (EnvFilter::try_from_default_env(), verbose) {
        (Ok(filter), _) => (filter, true),
        (Err(_), 0) => (EnvFilter::new("warn"), false),
        (Err(_), 1) => (EnvFilter::new("debug"), true),
        (Err(_), _) => (EnvFilter::new("trace"), true),
    };

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    (!fixed).then_some(handle)
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let filter = init_tracing(cli.verbose);

    let config_path = keychord_config::expand_path(&cli.config);
    let config = load_config(&config_path)?;

    if let Some(handle) = filter {
        handle
            .reload(EnvFilter::new(config.global.log_level.as_filter()))
            .into_diagnostic()?;
    }

    match cli.command {
        Commands::Check { json } => cmd_check(&config_path, &config, json),
        Commands::Replay { script, json } => cmd_replay(&config, &script, json),
        Commands::Listen { json } => cmd_listen(&config, json),
    }
}

fn load_config(path: &Path) -> miette::Result<BindingsConfig> {
    tracing::debug!("Loading bindings from {}", path.display());
    parse_config(path).map_err(miette::Report::new)
}

fn cmd_check(config_path: &Path, config: &BindingsConfig, json: bool) -> miette::Result<()> {
    if json {
        let dump = serde_json::to_string_pretty(config).into_diagnostic()?;
        println!("{}", dump);
        return Ok(());
    }

    // Registering catches anything the parser lets through
    Session::new(config, SystemClock)
        .map_err(|e| miette::miette!("{:#}", e))
        .wrap_err("Bindings do not register cleanly")?;

    println!("Bindings are valid: {}", config_path.display());
    println!("  Meta key: {}", config.global.meta_key);
    match config.global.sequence_delay {
        Some(delay) => println!("  Sequence delay: {} ms", delay.as_millis()),
        None => println!("  Sequence delay: never expires"),
    }
    println!("  Bindings: {}", config.bindings.len());
    for binding in &config.bindings {
        println!(
            "    - {} {} (line {})",
            binding.kind.node_name(),
            binding.name(),
            binding.location.line
        );
    }
    Ok(())
}

fn cmd_replay(config: &BindingsConfig, script_path: &Path, json: bool) -> miette::Result<()> {
    let source = std::fs::read_to_string(script_path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read script {}", script_path.display()))?;

    replay(config, &source, &mut std::io::stdout().lock(), json)
        .map_err(|e| miette::miette!("{:#}", e))
}

/// Run a script with a clock that only moves on `wait`.
fn replay(
    config: &BindingsConfig,
    source: &str,
    out: &mut impl Write,
    json: bool,
) -> anyhow::Result<()> {
    let lines = parse_script(source)?;
    let clock = ManualClock::new();
    let mut session = Session::new(config, clock.clone())?;

    let mut fired = 0;
    for line in &lines {
        if let Command::Wait(duration) = line.command {
            clock.advance(duration);
        }
        let report = session.apply(line.line, &line.text, &line.command);
        fired += report.fired.len();
        report.write_to(out, json)?;
    }

    if !json {
        writeln!(out, "{} step(s), {} callback(s) fired", lines.len(), fired)?;
    }
    Ok(())
}

fn cmd_listen(config: &BindingsConfig, json: bool) -> miette::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    let mut session = Session::new(config, SystemClock).map_err(|e| miette::miette!("{:#}", e))?;
    tracing::info!("Listening on stdin");

    runtime
        .block_on(listen::run(
            &mut session,
            tokio::io::BufReader::new(tokio::io::stdin()),
            &mut std::io::stdout(),
            json,
        ))
        .map_err(|e| miette::miette!("{:#}", e))
}
