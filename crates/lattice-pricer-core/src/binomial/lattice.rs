//! Terminal-node CRR lattice stages.
//!
//! The price of a European call on a recombining binomial lattice only needs
//! the `steps + 1` terminal nodes, so no intermediate tree is built. Every
//! vector here shares one indexing convention: index `i` is the node reached
//! by `steps - i` up-moves and `i` down-moves (index 0 = all-up).

use serde::{Deserialize, Serialize};
use statrs::function::factorial::binomial;

use crate::error::DomainError;
use crate::types::{Money, Rate, Years};
use crate::PricingResult;

/// Largest step count whose binomial coefficients stay inside the f64 range.
///
/// `C(n, n/2)` passes `f64::MAX` at roughly n = 1030, after which the
/// path-probability vector turns into `inf * 0 = NaN`. Beyond this count the
/// pricer still runs but the result is not trustworthy.
pub const MAX_SAFE_STEPS: u32 = 1000;

// ---------------------------------------------------------------------------
// Stage 1: parameter derivation
// ---------------------------------------------------------------------------

/// Per-step constants of a Cox-Ross-Rubinstein lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeConstants {
    /// Time per step, `T / steps`.
    pub dt: Years,
    /// Up factor, `exp(sigma * sqrt(dt))`.
    pub up: f64,
    /// Down factor, `exp(-sigma * sqrt(dt))`.
    pub down: f64,
    /// Risk-neutral probability of an up-move.
    pub p_up: f64,
}

/// The price moves of a lattice without the risk-neutral probability.
///
/// Defined for every non-negative volatility, including the flat `u = d = 1`
/// lattice of a zero-volatility stock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveFactors {
    pub dt: Years,
    pub up: f64,
    pub down: f64,
}

/// Node exponents run over `0..=steps` as `i32` for `powi`.
pub(crate) fn step_exponent(steps: u32) -> PricingResult<i32> {
    i32::try_from(steps).map_err(|_| DomainError::InvalidInput {
        field: "steps".into(),
        reason: format!("must not exceed {}", i32::MAX),
    })
}

/// Derive `(dt, u, d)`; zero volatility gives `u = d = 1`.
pub fn move_factors(
    volatility: Rate,
    time_to_expiry: Years,
    steps: u32,
) -> PricingResult<MoveFactors> {
    if steps == 0 {
        return Err(DomainError::DivisionByZero {
            context: "lattice time step T / steps (steps = 0)".into(),
        });
    }
    step_exponent(steps)?;
    if volatility < 0.0 {
        return Err(DomainError::InvalidInput {
            field: "volatility".into(),
            reason: "must be non-negative".into(),
        });
    }

    let dt = time_to_expiry / f64::from(steps);
    let sigma_sqrt_dt = volatility * dt.sqrt();
    Ok(MoveFactors {
        dt,
        up: sigma_sqrt_dt.exp(),
        down: (-sigma_sqrt_dt).exp(),
    })
}

/// Derive `(dt, u, d, p)` from volatility, rate, expiry and lattice resolution.
///
/// Zero volatility collapses the lattice to `u = d = 1`, which leaves the
/// risk-neutral probability undefined and is reported as a division by zero.
/// A probability outside [0, 1] means the lattice admits arbitrage.
pub fn derive_lattice(
    volatility: Rate,
    risk_free_rate: Rate,
    time_to_expiry: Years,
    steps: u32,
) -> PricingResult<LatticeConstants> {
    let MoveFactors { dt, up, down } = move_factors(volatility, time_to_expiry, steps)?;

    if up == down {
        return Err(DomainError::DivisionByZero {
            context: "risk-neutral probability (u == d, zero volatility)".into(),
        });
    }

    let p_up = ((risk_free_rate * dt).exp() - down) / (up - down);
    if !p_up.is_finite() || !(0.0..=1.0).contains(&p_up) {
        return Err(DomainError::FinancialImpossibility(format!(
            "risk-neutral probability {p_up} is outside [0, 1] \
             (rate {risk_free_rate}, volatility {volatility}, {steps} steps)"
        )));
    }

    Ok(LatticeConstants {
        dt,
        up,
        down,
        p_up,
    })
}

// ---------------------------------------------------------------------------
// Stage 2: terminal stock prices
// ---------------------------------------------------------------------------

/// `S0 * u^(steps-i) * d^i` for `i` in `0..=steps`.
pub fn terminal_prices(
    spot: Money,
    up: f64,
    down: f64,
    steps: u32,
) -> PricingResult<Vec<Money>> {
    let n = step_exponent(steps)?;
    Ok((0..=n)
        .map(|i| spot * up.powi(n - i) * down.powi(i))
        .collect())
}

// ---------------------------------------------------------------------------
// Stage 3: call payoffs
// ---------------------------------------------------------------------------

pub fn call_payoffs(prices: &[Money], strike: Money) -> Vec<Money> {
    prices.iter().map(|s| (s - strike).max(0.0)).collect()
}

// ---------------------------------------------------------------------------
// Stage 4: path probabilities and discounting
// ---------------------------------------------------------------------------

/// Binomial probability mass of reaching each terminal node.
///
/// Node `i` takes `steps - i` ups out of `steps` trials, so the mass is
/// `C(steps, i) * p^(steps-i) * (1-p)^i`. The coefficient is taken over
/// `steps` trials to match the exponents; the vector sums to one.
pub fn path_probabilities(p_up: f64, steps: u32) -> PricingResult<Vec<f64>> {
    let n = step_exponent(steps)?;
    let p_down = 1.0 - p_up;
    Ok((0..=n)
        .map(|i| binomial(u64::from(steps), i as u64) * p_up.powi(n - i) * p_down.powi(i))
        .collect())
}

/// `exp(-rT) * sum(payoff[i] * probability[i])`.
pub fn discounted_expectation(
    payoffs: &[Money],
    probabilities: &[f64],
    risk_free_rate: Rate,
    time_to_expiry: Years,
) -> Money {
    debug_assert_eq!(payoffs.len(), probabilities.len());
    let expected: f64 = payoffs
        .iter()
        .zip(probabilities)
        .map(|(v, q)| v * q)
        .sum();
    (-risk_free_rate * time_to_expiry).exp() * expected
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn standard() -> LatticeConstants {
        derive_lattice(0.20, 0.05, 1.0, 5).unwrap()
    }

    #[test]
    fn test_derive_lattice_known_values() {
        let c = standard();
        assert!((c.dt - 0.2).abs() < TOL);
        assert!((c.up - 1.093_564_691_148_541_7).abs() < TOL);
        assert!((c.down - 0.914_440_643_607_217).abs() < TOL);
        assert!((c.p_up - 0.533_761_517_726_386_8).abs() < 1e-10);
    }

    #[test]
    fn test_up_down_reciprocal() {
        for &(sigma, t, steps) in &[(0.2, 1.0, 5), (0.65, 0.25, 40), (0.05, 3.0, 300)] {
            let c = derive_lattice(sigma, 0.01, t, steps).unwrap();
            assert!((c.up * c.down - 1.0).abs() < 1e-12, "u*d = {}", c.up * c.down);
            assert!(c.down < 1.0 && c.up > 1.0);
        }
    }

    #[test]
    fn test_zero_steps_is_division_by_zero() {
        match derive_lattice(0.2, 0.05, 1.0, 0).unwrap_err() {
            DomainError::DivisionByZero { context } => assert!(context.contains("steps")),
            other => panic!("Expected DivisionByZero, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_volatility_is_division_by_zero() {
        match derive_lattice(0.0, 0.05, 1.0, 5).unwrap_err() {
            DomainError::DivisionByZero { context } => assert!(context.contains("u == d")),
            other => panic!("Expected DivisionByZero, got {other:?}"),
        }
    }

    #[test]
    fn test_rate_too_high_for_volatility() {
        // exp(r*dt) = exp(0.1) > u = exp(0.01 * sqrt(0.2))
        let err = derive_lattice(0.01, 0.50, 1.0, 5).unwrap_err();
        assert!(matches!(err, DomainError::FinancialImpossibility(_)));
    }

    #[test]
    fn test_terminal_prices_indexing() {
        let c = standard();
        let prices = terminal_prices(100.0, c.up, c.down, 5).unwrap();
        assert_eq!(prices.len(), 6);
        assert!((prices[0] - 100.0 * c.up.powi(5)).abs() < 1e-9);
        assert!((prices[5] - 100.0 * c.down.powi(5)).abs() < 1e-9);
        assert!(prices.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_terminal_prices_flat_lattice() {
        let f = move_factors(0.0, 1.0, 7).unwrap();
        assert_eq!((f.up, f.down), (1.0, 1.0));
        let prices = terminal_prices(42.0, f.up, f.down, 7).unwrap();
        assert_eq!(prices, vec![42.0; 8]);
    }

    #[test]
    fn test_move_factors_match_derived_lattice() {
        let f = move_factors(0.20, 1.0, 5).unwrap();
        let c = standard();
        assert_eq!((f.dt, f.up, f.down), (c.dt, c.up, c.down));
    }

    #[test]
    fn test_steps_beyond_i32_rejected() {
        let too_many = i32::MAX as u32 + 1;
        for err in [
            terminal_prices(100.0, 1.1, 0.9, too_many).unwrap_err(),
            path_probabilities(0.5, u32::MAX).unwrap_err(),
            derive_lattice(0.2, 0.05, 1.0, too_many).unwrap_err(),
        ] {
            match err {
                DomainError::InvalidInput { field, .. } => assert_eq!(field, "steps"),
                other => panic!("Expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_call_payoffs_floor_at_zero() {
        let payoffs = call_payoffs(&[130.0, 100.0, 80.0], 100.0);
        assert_eq!(payoffs, vec![30.0, 0.0, 0.0]);
    }

    #[test]
    fn test_path_probabilities_sum_to_one() {
        for steps in [1, 2, 5, 50, 500] {
            let c = derive_lattice(0.2, 0.05, 1.0, steps).unwrap();
            let probs = path_probabilities(c.p_up, steps).unwrap();
            assert_eq!(probs.len(), steps as usize + 1);
            let total: f64 = probs.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "steps={steps}: sum={total}");
            assert!(probs.iter().all(|q| *q >= 0.0));
        }
    }

    #[test]
    fn test_path_probabilities_degenerate_p() {
        // p = 1 puts all mass on the all-up node, p = 0 on the all-down node
        assert_eq!(path_probabilities(1.0, 3).unwrap(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(path_probabilities(0.0, 3).unwrap(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_single_step_expectation() {
        let c = derive_lattice(0.2, 0.05, 1.0, 1).unwrap();
        let prices = terminal_prices(100.0, c.up, c.down, 1).unwrap();
        let payoffs = call_payoffs(&prices, 100.0);
        let probs = path_probabilities(c.p_up, 1).unwrap();
        let price = discounted_expectation(&payoffs, &probs, 0.05, 1.0);
        // Only the up node pays: e^{-r} * p * (100u - 100)
        let expected = (-0.05_f64).exp() * c.p_up * (100.0 * c.up - 100.0);
        assert!((price - expected).abs() < TOL);
        assert!((price - 12.162_284_964_623_943).abs() < 1e-9);
    }

    #[test]
    fn test_probability_mass_holds_at_max_safe_steps() {
        let c = derive_lattice(0.2, 0.05, 1.0, MAX_SAFE_STEPS).unwrap();
        let probs = path_probabilities(c.p_up, MAX_SAFE_STEPS).unwrap();
        assert!(probs.iter().all(|q| q.is_finite()));
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum={total} at {MAX_SAFE_STEPS} steps");
    }
}
