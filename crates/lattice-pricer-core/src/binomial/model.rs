use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::analytic::black_scholes_call;
use super::lattice::{
    call_payoffs, derive_lattice, discounted_expectation, move_factors, path_probabilities,
    step_exponent, terminal_prices, LatticeConstants, MoveFactors, MAX_SAFE_STEPS,
};
use crate::error::DomainError;
use crate::types::*;
use crate::PricingResult;

/// Lattice resolution used when the caller does not supply one.
pub const DEFAULT_STEPS: u32 = 5;

pub(crate) fn default_steps() -> u32 {
    DEFAULT_STEPS
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Economic and contract inputs of a single pricing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub spot_price: Money,
    /// Real-world expected return of the stock. Part of the model's parameter
    /// set but has no effect on the risk-neutral price.
    #[serde(default)]
    pub drift: Rate,
    pub volatility: Rate,
    pub risk_free_rate: Rate,
    pub time_to_expiry: Years,
    pub strike_price: Money,
    #[serde(default = "default_steps")]
    pub steps: u32,
}

impl PricingConfig {
    pub fn new(
        spot_price: Money,
        drift: Rate,
        volatility: Rate,
        risk_free_rate: Rate,
        time_to_expiry: Years,
        strike_price: Money,
    ) -> Self {
        Self {
            spot_price,
            drift,
            volatility,
            risk_free_rate,
            time_to_expiry,
            strike_price,
            steps: DEFAULT_STEPS,
        }
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }
}

/// Every intermediate vector of one pricing run, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeBreakdown {
    pub constants: LatticeConstants,
    pub terminal_prices: Vec<Money>,
    pub payoffs: Vec<Money>,
    pub path_probabilities: Vec<f64>,
    pub discount_factor: f64,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinomialCallOutput {
    pub price: Money,
    pub lattice: LatticeConstants,
    pub discount_factor: f64,
    pub intrinsic_value: Money,
    pub time_value: Money,
    pub moneyness: String,
    pub black_scholes_price: Money,
    /// Lattice price minus the closed-form price.
    pub lattice_error: Money,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn require_finite(field: &str, value: f64) -> PricingResult<()> {
    if !value.is_finite() {
        return Err(DomainError::InvalidInput {
            field: field.into(),
            reason: "must be a finite number".into(),
        });
    }
    Ok(())
}

fn validate_config(config: &PricingConfig) -> PricingResult<()> {
    require_finite("spot_price", config.spot_price)?;
    require_finite("drift", config.drift)?;
    require_finite("volatility", config.volatility)?;
    require_finite("risk_free_rate", config.risk_free_rate)?;
    require_finite("time_to_expiry", config.time_to_expiry)?;
    require_finite("strike_price", config.strike_price)?;

    if config.spot_price < 0.0 {
        return Err(DomainError::InvalidInput {
            field: "spot_price".into(),
            reason: "must be non-negative".into(),
        });
    }
    if config.volatility < 0.0 {
        return Err(DomainError::InvalidInput {
            field: "volatility".into(),
            reason: "must be non-negative".into(),
        });
    }
    if config.time_to_expiry <= 0.0 {
        return Err(DomainError::InvalidInput {
            field: "time_to_expiry".into(),
            reason: "must be positive".into(),
        });
    }
    if config.strike_price < 0.0 {
        return Err(DomainError::InvalidInput {
            field: "strike_price".into(),
            reason: "must be non-negative".into(),
        });
    }
    if config.steps < 1 {
        return Err(DomainError::InvalidInput {
            field: "steps".into(),
            reason: "lattice needs at least one step".into(),
        });
    }
    step_exponent(config.steps)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// European call priced on the terminal nodes of a CRR lattice.
///
/// Holds only the validated configuration; every query recomputes from it.
#[derive(Debug, Clone)]
pub struct BinomialCallModel {
    config: PricingConfig,
}

impl BinomialCallModel {
    pub fn new(config: PricingConfig) -> PricingResult<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn lattice(&self) -> PricingResult<LatticeConstants> {
        let c = &self.config;
        derive_lattice(c.volatility, c.risk_free_rate, c.time_to_expiry, c.steps)
    }

    /// Up/down factors only; unlike `lattice()` this succeeds at zero volatility.
    pub fn move_factors(&self) -> PricingResult<MoveFactors> {
        let c = &self.config;
        move_factors(c.volatility, c.time_to_expiry, c.steps)
    }

    pub fn terminal_prices(&self) -> PricingResult<Vec<Money>> {
        let f = self.move_factors()?;
        terminal_prices(self.config.spot_price, f.up, f.down, self.config.steps)
    }

    pub fn payoffs(&self) -> PricingResult<Vec<Money>> {
        Ok(call_payoffs(&self.terminal_prices()?, self.config.strike_price))
    }

    pub fn path_probabilities(&self) -> PricingResult<Vec<f64>> {
        path_probabilities(self.lattice()?.p_up, self.config.steps)
    }

    pub fn discount_factor(&self) -> f64 {
        (-self.config.risk_free_rate * self.config.time_to_expiry).exp()
    }

    pub fn price(&self) -> PricingResult<Money> {
        Ok(self.breakdown()?.price)
    }

    /// Run the full pipeline once and keep every intermediate vector.
    pub fn breakdown(&self) -> PricingResult<LatticeBreakdown> {
        let c = &self.config;
        let constants = self.lattice()?;
        let prices = terminal_prices(c.spot_price, constants.up, constants.down, c.steps)?;
        let payoffs = call_payoffs(&prices, c.strike_price);
        let probabilities = path_probabilities(constants.p_up, c.steps)?;
        let price =
            discounted_expectation(&payoffs, &probabilities, c.risk_free_rate, c.time_to_expiry);

        tracing::debug!(
            steps = c.steps,
            up = constants.up,
            down = constants.down,
            p_up = constants.p_up,
            price,
            "priced european call on binomial lattice"
        );

        Ok(LatticeBreakdown {
            constants,
            terminal_prices: prices,
            payoffs,
            path_probabilities: probabilities,
            discount_factor: self.discount_factor(),
            price,
        })
    }
}

// ---------------------------------------------------------------------------
// Moneyness and intrinsic value helpers
// ---------------------------------------------------------------------------

fn classify_moneyness(spot: Money, strike: Money) -> String {
    if strike == 0.0 {
        return if spot > 0.0 { "ITM".into() } else { "ATM".into() };
    }
    let ratio = spot / strike;
    // ATM band: within 1% of strike
    if ratio > 1.01 {
        "ITM".into()
    } else if ratio < 0.99 {
        "OTM".into()
    } else {
        "ATM".into()
    }
}

/// Warnings shared by every envelope built from a configuration.
pub(crate) fn config_warnings(config: &PricingConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.steps > MAX_SAFE_STEPS {
        warnings.push(format!(
            "{} steps exceeds the f64-safe maximum of {MAX_SAFE_STEPS}; \
             binomial coefficients may overflow",
            config.steps
        ));
    }
    if config.drift != 0.0 {
        warnings.push(format!(
            "drift {} has no effect on the risk-neutral price",
            config.drift
        ));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Public API: price_european_call
// ---------------------------------------------------------------------------

pub fn price_european_call(
    config: &PricingConfig,
) -> PricingResult<ComputationOutput<BinomialCallOutput>> {
    let start = Instant::now();
    let model = BinomialCallModel::new(config.clone())?;
    let breakdown = model.breakdown()?;

    let s = config.spot_price;
    let k = config.strike_price;
    let bs = black_scholes_call(config)?;
    let intrinsic = (s - k).max(0.0);

    let output = BinomialCallOutput {
        price: breakdown.price,
        lattice: breakdown.constants,
        discount_factor: breakdown.discount_factor,
        intrinsic_value: intrinsic,
        time_value: breakdown.price - intrinsic,
        moneyness: classify_moneyness(s, k),
        black_scholes_price: bs,
        lattice_error: breakdown.price - bs,
    };

    let methodology = "CRR binomial lattice (terminal-node aggregation)";
    let assumptions = serde_json::json!({
        "model": methodology,
        "exercise_style": "European",
        "option_type": "Call",
        "risk_free_rate": config.risk_free_rate,
        "volatility": config.volatility,
        "drift": config.drift,
        "steps": config.steps,
        "binomial_trials": config.steps,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &assumptions,
        config_warnings(config),
        elapsed,
        output,
    ))
}

/// Lattice diagnostics in the standard envelope: constants, every terminal
/// vector and the price, with the same warnings as `price_european_call`.
pub fn lattice_breakdown(
    config: &PricingConfig,
) -> PricingResult<ComputationOutput<LatticeBreakdown>> {
    let start = Instant::now();
    let breakdown = BinomialCallModel::new(config.clone())?.breakdown()?;

    let methodology = "CRR binomial lattice (terminal nodes, index i = i down-moves)";
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        config,
        config_warnings(config),
        elapsed,
        breakdown,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
