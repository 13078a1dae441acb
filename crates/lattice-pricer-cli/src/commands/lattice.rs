use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::Value;

use lattice_pricer_core::binomial::convergence;
use lattice_pricer_core::binomial::model::{self, PricingConfig, DEFAULT_STEPS};
use lattice_pricer_core::binomial::surface::{self, SurfaceInput};

use crate::input;

/// Contract and market flags shared by the single-contract commands
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ConfigArgs {
    /// Initial stock price S0
    #[arg(long, alias = "s0")]
    pub spot: Option<f64>,

    /// Expected stock return (accepted, no effect on the price)
    #[arg(long, alias = "mu", default_value = "0")]
    pub drift: f64,

    /// Annualised volatility (e.g. 0.2 for 20%)
    #[arg(long, alias = "sigma")]
    pub volatility: Option<f64>,

    /// Continuously compounded risk-free rate
    #[arg(long)]
    pub rate: Option<f64>,

    /// Time to expiry in years
    #[arg(long)]
    pub expiry: Option<f64>,

    /// Strike price
    #[arg(long)]
    pub strike: Option<f64>,

    /// Number of lattice steps
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a single lattice price
#[derive(Args)]
pub struct PriceArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for lattice diagnostics
#[derive(Args)]
pub struct LatticeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for convergence analysis
#[derive(Args)]
pub struct ConvergenceArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Comma-separated step counts (e.g. 5,50,500)
    #[arg(long, value_delimiter = ',', default_value = "5,10,25,50,100,250,500")]
    pub steps_list: Vec<u32>,
}

/// Arguments for a strike/maturity surface
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SurfaceArgs {
    /// Initial stock price S0
    #[arg(long)]
    pub spot: Option<f64>,

    /// Expected stock return (accepted, no effect on prices)
    #[arg(long, default_value = "0")]
    pub drift: f64,

    /// Annualised volatility
    #[arg(long)]
    pub volatility: Option<f64>,

    /// Continuously compounded risk-free rate
    #[arg(long)]
    pub rate: Option<f64>,

    /// Number of lattice steps per grid point
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Comma-separated strikes
    #[arg(long, value_delimiter = ',')]
    pub strikes: Vec<f64>,

    /// Comma-separated maturities in years
    #[arg(long, value_delimiter = ',')]
    pub maturities: Vec<f64>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// File first, then piped stdin, then the flag fallback.
fn load_or<T, F>(path: &Option<String>, from_flags: F) -> Result<T, Box<dyn std::error::Error>>
where
    T: DeserializeOwned,
    F: FnOnce() -> Result<T, Box<dyn std::error::Error>>,
{
    if let Some(ref path) = path {
        input::file::read_input(path)
    } else if let Some(parsed) = input::stdin::read_stdin()? {
        Ok(parsed)
    } else {
        from_flags()
    }
}

fn resolve_config(args: &ConfigArgs) -> Result<PricingConfig, Box<dyn std::error::Error>> {
    load_or(&args.input, || {
        Ok(PricingConfig {
            spot_price: args.spot.ok_or("--spot is required (or provide --input)")?,
            drift: args.drift,
            volatility: args
                .volatility
                .ok_or("--volatility is required (or provide --input)")?,
            risk_free_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            time_to_expiry: args.expiry.ok_or("--expiry is required (or provide --input)")?,
            strike_price: args.strike.ok_or("--strike is required (or provide --input)")?,
            steps: args.steps,
        })
    })
}

pub fn run_price(args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = resolve_config(&args.config)?;
    let result = model::price_european_call(&config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_lattice(args: LatticeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = resolve_config(&args.config)?;
    let result = model::lattice_breakdown(&config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_convergence(args: ConvergenceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = resolve_config(&args.config)?;
    let result = convergence::convergence_profile(&config, &args.steps_list)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_surface(args: SurfaceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let surface_input: SurfaceInput = load_or(&args.input, || {
        Ok(SurfaceInput {
            spot_price: args.spot.ok_or("--spot is required (or provide --input)")?,
            drift: args.drift,
            volatility: args
                .volatility
                .ok_or("--volatility is required (or provide --input)")?,
            risk_free_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            steps: args.steps,
            strikes: args.strikes.clone(),
            maturities: args.maturities.clone(),
        })
    })?;
    let result = surface::price_surface(&surface_input)?;
    Ok(serde_json::to_value(result)?)
}
