mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::lattice::{ConvergenceArgs, LatticeArgs, PriceArgs, SurfaceArgs};

/// Binomial lattice pricing of European call options
#[derive(Parser)]
#[command(
    name = "lpx",
    version,
    about = "Binomial lattice pricing of European call options",
    long_about = "Prices European calls on a Cox-Ross-Rubinstein binomial lattice using \
                  terminal-node aggregation. Supports single prices, lattice diagnostics, \
                  convergence against Black-Scholes, and strike/maturity surfaces."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a European call on a binomial lattice
    Price(PriceArgs),
    /// Show lattice constants and terminal-node vectors
    Lattice(LatticeArgs),
    /// Compare lattice prices at several step counts with Black-Scholes
    Convergence(ConvergenceArgs),
    /// Price a strike/maturity grid
    Surface(SurfaceArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Price(args) => commands::lattice::run_price(args),
        Commands::Lattice(args) => commands::lattice::run_lattice(args),
        Commands::Convergence(args) => commands::lattice::run_convergence(args),
        Commands::Surface(args) => commands::lattice::run_surface(args),
        Commands::Version => {
            println!("lpx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!("command failed: {e:?}");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
