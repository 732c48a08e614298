//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use serde_json::json;
use thiserror::Error;

use insertion_sort_visualizer::cli::{play, trace};
use insertion_sort_visualizer::core::config::{ArrayConfig, Config};
use insertion_sort_visualizer::core::errors::IsvError;
use insertion_sort_visualizer::logger::trace::{CHANNEL_CAPACITY, TraceEvent, spawn_trace_logger};

/// Insertion Sort Visualizer: watch insertion sort one comparison at a time.
#[derive(Debug, Parser)]
#[command(
    name = "isv",
    author,
    version,
    about = "Insertion Sort Visualizer - step-by-step sorting animation",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Animate a sort in the terminal.
    Play(PlayArgs),
    /// Run one sort headless and print every sub-step.
    Trace(TraceArgs),
    /// Print the effective configuration.
    Config,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ShapeArgs {
    /// Number of values (clamped to 200).
    #[arg(long, value_name = "N")]
    size: Option<usize>,
    /// Largest value (clamped to 99).
    #[arg(long, value_name = "MAX")]
    range: Option<u32>,
    /// Seed for a reproducible array.
    #[arg(long)]
    seed: Option<u64>,
    /// Animation speed, 0 (slowest) to 100 (no delay).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    speed: Option<u8>,
}

#[derive(Debug, Clone, Args)]
struct PlayArgs {
    #[command(flatten)]
    shape: ShapeArgs,
    /// Append every sub-step to this JSONL file.
    #[arg(long, value_name = "PATH")]
    trace_jsonl: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct TraceArgs {
    /// Explicit values to sort, e.g. `5,3,1`.
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["size", "range", "seed"])]
    values: Vec<u32>,
    #[command(flatten)]
    shape: ShapeArgs,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<IsvError> for CliError {
    fn from(value: IsvError) -> Self {
        match value {
            IsvError::InvalidConfiguration { .. }
            | IsvError::MissingConfig { .. }
            | IsvError::ConfigParse { .. } => Self::User(value.to_string()),
            _ => Self::Runtime(value.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    match &cli.command {
        Command::Play(args) => run_play(cli, args),
        Command::Trace(args) => run_trace(cli, args),
        Command::Config => run_config(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

/// Load the config file and layer command-line overrides on top.
fn effective_config(cli: &Cli, shape: &ShapeArgs) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.array = ArrayConfig {
        num_values: shape.size.unwrap_or(config.array.num_values),
        value_range: shape.range.unwrap_or(config.array.value_range),
        seed: shape.seed.or(config.array.seed),
    }
    .clamped();
    if let Some(speed) = shape.speed {
        config.animation.speed = speed;
    }
    config.validate()?;
    Ok(config)
}

fn run_play(cli: &Cli, args: &PlayArgs) -> Result<(), CliError> {
    if !io::stdout().is_terminal() {
        return Err(CliError::User(
            "isv play needs an interactive terminal; use `isv trace` instead".to_string(),
        ));
    }
    let mut config = effective_config(cli, &args.shape)?;
    if let Some(path) = &args.trace_jsonl {
        config.trace.jsonl_path = Some(path.clone());
    }
    play::run(&config)?;
    Ok(())
}

fn run_trace(cli: &Cli, args: &TraceArgs) -> Result<(), CliError> {
    let mut shape = args.shape.clone();
    // Headless runs default to no delay unless asked otherwise.
    shape.speed = Some(shape.speed.unwrap_or(100));
    let config = effective_config(cli, &shape)?;

    let source = if args.values.is_empty() {
        trace::Source::Random {
            size: config.array.num_values,
            range: config.array.value_range,
            seed: config.array.seed,
        }
    } else {
        trace::Source::Explicit(args.values.clone())
    };
    let options = trace::TraceOptions {
        source,
        speed: config.animation.speed,
        max_delay: Duration::from_millis(config.animation.max_delay_ms),
        json: cli.json,
    };

    let tracer = match &config.trace.jsonl_path {
        Some(path) => {
            let (handle, join) = spawn_trace_logger(Some(path), CHANNEL_CAPACITY)?;
            handle.send(TraceEvent::SessionStarted {
                config_hash: config.stable_hash()?,
                num_values: config.array.num_values,
                speed: config.animation.speed,
            });
            Some((handle, join))
        }
        None => None,
    };

    let mut stdout = io::stdout().lock();
    let outcome = trace::run(&options, tracer.as_ref().map(|(h, _)| h), &mut stdout);
    if let Err(e) = &outcome
        && let Some((handle, _)) = &tracer
    {
        handle.send(TraceEvent::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        });
    }
    if let Some((handle, join)) = tracer {
        handle.shutdown();
        if join.join().is_err() {
            eprintln!("[ISV-TRACE] trace thread panicked");
        }
    }
    let summary = outcome?;

    if cli.json {
        let payload = json!({
            "command": "trace",
            "summary": summary,
        });
        writeln!(stdout, "{}", serde_json::to_string(&payload)?)?;
    }
    stdout.flush()?;
    Ok(())
}

fn run_config(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();
    if cli.json {
        let payload = json!({
            "command": "config",
            "path": config.config_file,
            "hash": config.stable_hash()?,
            "config": config,
        });
        writeln!(stdout, "{}", serde_json::to_string_pretty(&payload)?)?;
    } else {
        if let Some(path) = &config.config_file {
            writeln!(stdout, "# source: {}", path.display())?;
        }
        write!(stdout, "{}", config.to_toml()?)?;
    }
    Ok(())
}
