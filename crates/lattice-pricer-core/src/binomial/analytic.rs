//! Black-Scholes closed form for the European call, the limit the lattice
//! converges to as the step count grows.

use statrs::distribution::{ContinuousCDF, Normal};

use super::model::PricingConfig;
use crate::error::DomainError;
use crate::PricingResult;

/// `S N(d1) - K e^{-rT} N(d2)` with no dividend yield.
pub fn black_scholes_call(config: &PricingConfig) -> PricingResult<f64> {
    let s = config.spot_price;
    let k = config.strike_price;
    let r = config.risk_free_rate;
    let t = config.time_to_expiry;
    let sigma = config.volatility;

    if t <= 0.0 {
        return Err(DomainError::InvalidInput {
            field: "time_to_expiry".into(),
            reason: "must be positive".into(),
        });
    }
    if sigma <= 0.0 {
        return Err(DomainError::DivisionByZero {
            context: "Black-Scholes d1 (zero volatility)".into(),
        });
    }
    // A zero strike is a claim on the stock itself.
    if k == 0.0 {
        return Ok(s);
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| DomainError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;

    let sigma_sqrt_t = sigma * t.sqrt();
    let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
    let d2 = d1 - sigma_sqrt_t;
    Ok(s * normal.cdf(d1) - k * (-r * t).exp() * normal.cdf(d2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm() -> PricingConfig {
        PricingConfig::new(100.0, 0.0, 0.20, 0.05, 1.0, 100.0)
    }

    #[test]
    fn test_atm_reference_value() {
        // Hull: S=K=100, T=1, r=5%, vol=20% -> 10.4506
        let price = black_scholes_call(&atm()).unwrap();
        assert!((price - 10.450_583_572_185_565).abs() < 1e-6, "got {price}");
    }

    #[test]
    fn test_zero_strike_is_spot() {
        let cfg = PricingConfig {
            strike_price: 0.0,
            ..atm()
        };
        assert_eq!(black_scholes_call(&cfg).unwrap(), 100.0);
    }

    #[test]
    fn test_deep_otm_near_zero() {
        let cfg = PricingConfig {
            spot_price: 50.0,
            strike_price: 200.0,
            ..atm()
        };
        let price = black_scholes_call(&cfg).unwrap();
        assert!(price.abs() < 1e-3, "got {price}");
    }

    #[test]
    fn test_zero_volatility_rejected() {
        let cfg = PricingConfig {
            volatility: 0.0,
            ..atm()
        };
        assert!(matches!(
            black_scholes_call(&cfg).unwrap_err(),
            DomainError::DivisionByZero { .. }
        ));
    }
}
