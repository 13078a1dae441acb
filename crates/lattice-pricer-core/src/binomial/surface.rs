//! Strike/maturity grids of independent lattice prices.
//!
//! Every grid point is its own pricing run with no shared state, so with the
//! `parallel` feature the grid is priced on the rayon pool. Output order is
//! maturity-major in both paths.

use serde::{Deserialize, Serialize};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::model::{config_warnings, default_steps, BinomialCallModel, PricingConfig};
use crate::error::DomainError;
use crate::types::*;
use crate::PricingResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceInput {
    pub spot_price: Money,
    #[serde(default)]
    pub drift: Rate,
    pub volatility: Rate,
    pub risk_free_rate: Rate,
    #[serde(default = "default_steps")]
    pub steps: u32,
    pub strikes: Vec<Money>,
    pub maturities: Vec<Years>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub maturity: Years,
    pub strike: Money,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceOutput {
    pub maturity_count: usize,
    pub strike_count: usize,
    pub points: Vec<SurfacePoint>,
}

fn grid_configs(input: &SurfaceInput) -> Vec<PricingConfig> {
    input
        .maturities
        .iter()
        .flat_map(|&maturity| {
            input.strikes.iter().map(move |&strike| PricingConfig {
                spot_price: input.spot_price,
                drift: input.drift,
                volatility: input.volatility,
                risk_free_rate: input.risk_free_rate,
                time_to_expiry: maturity,
                strike_price: strike,
                steps: input.steps,
            })
        })
        .collect()
}

fn price_point(config: PricingConfig) -> PricingResult<SurfacePoint> {
    let maturity = config.time_to_expiry;
    let strike = config.strike_price;
    let price = BinomialCallModel::new(config)?.price()?;
    Ok(SurfacePoint {
        maturity,
        strike,
        price,
    })
}

#[cfg(feature = "parallel")]
fn price_grid(configs: Vec<PricingConfig>) -> PricingResult<Vec<SurfacePoint>> {
    configs.into_par_iter().map(price_point).collect()
}

#[cfg(not(feature = "parallel"))]
fn price_grid(configs: Vec<PricingConfig>) -> PricingResult<Vec<SurfacePoint>> {
    configs.into_iter().map(price_point).collect()
}

/// Price every (maturity, strike) pair. Any failing point fails the whole
/// surface; no partial grid is returned.
pub fn price_surface(input: &SurfaceInput) -> PricingResult<ComputationOutput<SurfaceOutput>> {
    let start = Instant::now();
    if input.strikes.is_empty() {
        return Err(DomainError::InvalidInput {
            field: "strikes".into(),
            reason: "at least one strike is required".into(),
        });
    }
    if input.maturities.is_empty() {
        return Err(DomainError::InvalidInput {
            field: "maturities".into(),
            reason: "at least one maturity is required".into(),
        });
    }

    let configs = grid_configs(input);
    let warnings = config_warnings(&configs[0]);
    let points = price_grid(configs)?;

    let output = SurfaceOutput {
        maturity_count: input.maturities.len(),
        strike_count: input.strikes.len(),
        points,
    };
    let assumptions = serde_json::json!({
        "model": "CRR binomial lattice per grid point",
        "steps": input.steps,
        "volatility": input.volatility,
        "risk_free_rate": input.risk_free_rate,
        "parallel": cfg!(feature = "parallel"),
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Binomial call price surface",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid() -> SurfaceInput {
        SurfaceInput {
            spot_price: 100.0,
            drift: 0.0,
            volatility: 0.20,
            risk_free_rate: 0.05,
            steps: 5,
            strikes: vec![90.0, 100.0, 110.0],
            maturities: vec![0.5, 1.0],
        }
    }

    #[test]
    fn test_grid_order_is_maturity_major() {
        let out = price_surface(&grid()).unwrap();
        let coords: Vec<(f64, f64)> = out
            .result
            .points
            .iter()
            .map(|p| (p.maturity, p.strike))
            .collect();
        assert_eq!(
            coords,
            vec![
                (0.5, 90.0),
                (0.5, 100.0),
                (0.5, 110.0),
                (1.0, 90.0),
                (1.0, 100.0),
                (1.0, 110.0),
            ]
        );
        assert_eq!(out.result.maturity_count, 2);
        assert_eq!(out.result.strike_count, 3);
    }

    #[test]
    fn test_points_match_single_runs() {
        let out = price_surface(&grid()).unwrap();
        let atm_1y = &out.result.points[4];
        let single = BinomialCallModel::new(PricingConfig::new(100.0, 0.0, 0.20, 0.05, 1.0, 100.0))
            .unwrap()
            .price()
            .unwrap();
        assert_eq!(atm_1y.price.to_bits(), single.to_bits());
    }

    #[test]
    fn test_call_prices_fall_with_strike() {
        let out = price_surface(&grid()).unwrap();
        for row in out.result.points.chunks(3) {
            assert!(row[0].price >= row[1].price && row[1].price >= row[2].price);
        }
    }

    #[test]
    fn test_empty_axes_rejected() {
        let no_strikes = SurfaceInput {
            strikes: vec![],
            ..grid()
        };
        assert!(matches!(
            price_surface(&no_strikes).unwrap_err(),
            DomainError::InvalidInput { ref field, .. } if field == "strikes"
        ));
        let no_maturities = SurfaceInput {
            maturities: vec![],
            ..grid()
        };
        assert!(price_surface(&no_maturities).is_err());
    }

    #[test]
    fn test_bad_point_fails_whole_surface() {
        let input = SurfaceInput {
            strikes: vec![100.0, -1.0],
            ..grid()
        };
        assert!(price_surface(&input).is_err());
    }
}
