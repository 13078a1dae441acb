use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::analytic::black_scholes_call;
use super::model::{config_warnings, BinomialCallModel, PricingConfig};
use crate::error::DomainError;
use crate::types::*;
use crate::PricingResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub steps: u32,
    pub price: Money,
    pub absolute_error: Money,
    /// `None` when the closed-form price is zero.
    pub relative_error: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceOutput {
    pub black_scholes_price: Money,
    pub points: Vec<ConvergencePoint>,
}

/// Price the same contract at each requested step count and compare every
/// lattice price against the Black-Scholes limit.
///
/// The `steps` field of `config` is ignored in favour of `steps_list`.
pub fn convergence_profile(
    config: &PricingConfig,
    steps_list: &[u32],
) -> PricingResult<ComputationOutput<ConvergenceOutput>> {
    let start = Instant::now();
    if steps_list.is_empty() {
        return Err(DomainError::InvalidInput {
            field: "steps_list".into(),
            reason: "at least one step count is required".into(),
        });
    }

    let bs = black_scholes_call(config)?;
    let mut warnings = Vec::new();
    let mut points = Vec::with_capacity(steps_list.len());

    for &steps in steps_list {
        let run = config.clone().with_steps(steps);
        for w in config_warnings(&run) {
            if !warnings.contains(&w) {
                warnings.push(w);
            }
        }
        let price = BinomialCallModel::new(run)?.price()?;
        let absolute_error = (price - bs).abs();
        points.push(ConvergencePoint {
            steps,
            price,
            absolute_error,
            relative_error: (bs > 0.0).then(|| absolute_error / bs),
        });
    }

    let output = ConvergenceOutput {
        black_scholes_price: bs,
        points,
    };
    let assumptions = serde_json::json!({
        "model": "CRR binomial lattice vs Black-Scholes",
        "steps_list": steps_list,
        "volatility": config.volatility,
        "risk_free_rate": config.risk_free_rate,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Binomial convergence to Black-Scholes",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}
