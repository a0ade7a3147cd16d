//! Strobe CLI, the command-line driver for the strobe simulation kernel.
//!
//! Provides `strobe run`, which elaborates the built-in clocked greeting
//! design, simulates it for a bounded time and reports what happened.

#![warn(missing_docs)]

mod run;

use std::process;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Strobe, a discrete-event simulation kernel.
#[derive(Parser, Debug)]
#[command(name = "strobe", version, about = "Strobe discrete-event simulator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `strobe.toml` file or a directory containing one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate the clocked greeting design.
    Run(RunArgs),
}

/// Arguments for the `strobe run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Simulation end time (e.g., "10ns", "1us").
    #[arg(long)]
    pub time: Option<String>,

    /// Write every committed signal change to this file as JSON lines.
    #[arg(long)]
    pub trace: Option<String>,

    /// Delta cycles per time step before reporting an oscillation.
    #[arg(long)]
    pub max_deltas: Option<u32>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Log level used when `RUST_LOG` is not set.
    fn default_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::ERROR
        } else if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the flag-derived level.
fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::builder()
        .with_default_directive(global.default_level().into())
        .from_env_lossy();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if let Err(e) = installed {
        eprintln!("warning: could not install log subscriber: {e}");
    }
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
