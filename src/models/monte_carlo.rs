use crate::errors::{EngineError, EngineResult};
use crate::models::Simulation;
use crate::state::{PricingResult, SimulationParameters, StepCoefficients};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

/// Monte Carlo pricing of a European call under risk-neutral GBM.
///
/// log S_{t+dt} = log S_t + (r - sigma^2/2)*dt + sigma*sqrt(dt)*Z
///
/// price = e^{-rT} * mean(max(S_T - K, 0))
/// se    = e^{-rT} * std(payoff) / sqrt(n_paths)
///
/// `std` is the population standard deviation (divide by n_paths).
/// Only the live log-price vector is kept, so memory is O(n_paths).
pub struct EuropeanCallMc {
    params: SimulationParameters,
}

impl EuropeanCallMc {
    pub fn new(params: SimulationParameters) -> Self {
        Self { params }
    }
}

impl Simulation for EuropeanCallMc {
    type Output = PricingResult;

    #[inline]
    fn name(&self) -> &'static str {
        "European-Call-MC"
    }

    fn simulate(&self, seed: u64) -> EngineResult<PricingResult> {
        simulate(seed, &self.params)
    }
}

/// Price one seed. Parameters are validated before any draw is made.
pub fn simulate(seed: u64, params: &SimulationParameters) -> EngineResult<PricingResult> {
    params.validate()?;

    let coeffs = StepCoefficients::new(params);
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::standard();

    let mut log_prices = vec![coeffs.log_s0; params.n_paths];

    // Step-major order: all paths advance one dt before the next draw batch.
    for _ in 0..params.n_steps {
        for log_price in log_prices.iter_mut() {
            let z: f64 = normal.sample(&mut rng);
            *log_price += coeffs.drift + coeffs.vol * z;
        }
    }

    // Reuse the path buffer for payoffs.
    let mut payoffs = log_prices;
    for x in payoffs.iter_mut() {
        let s_t = x.exp();
        if !s_t.is_finite() {
            return Err(EngineError::NumericOverflow(format!(
                "terminal price overflowed (log price {x})"
            )));
        }
        *x = (s_t - params.strike).max(0.0);
    }

    let n = params.n_paths as f64;
    let mean = payoffs.iter().sum::<f64>() / n;
    let var = payoffs.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n;

    let discount = params.discount();
    let price = discount * mean;
    let se = discount * var.sqrt() / n.sqrt();

    if !price.is_finite() || !se.is_finite() {
        return Err(EngineError::NumericOverflow(format!(
            "non-finite estimate: price={price} se={se}"
        )));
    }

    tracing::debug!(seed, price, se, "pricing run finished");

    Ok(PricingResult { seed, price, se, params: *params })
}
