use crate::state::SimulationParameters;
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European call, used as the analytic reference for the
/// Monte Carlo estimate.
///
/// C = S0*Phi(d1) - K*e^{-rT}*Phi(d2)
///
/// where d1 = (ln(S0/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// and   d2 = d1 - sigma * sqrt(T)
pub struct BlackScholesCall {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholesCall {
    pub fn new() -> Self {
        Self { normal: Normal::standard() }
    }

    /// Closed-form price. Pure function of the contract fields;
    /// n_paths / n_steps are ignored.
    pub fn price(&self, params: &SimulationParameters) -> f64 {
        let s0 = params.s0;
        let k = params.strike;
        let t = params.maturity;
        let discount = params.discount();
        let sigma_sqrt_t = params.sigma * t.sqrt();

        // No diffusion left: the payoff is the discounted forward intrinsic value.
        if sigma_sqrt_t < 1e-12 || t <= 0.0 {
            return discount * (s0 / discount - k).max(0.0);
        }

        let d1 = ((s0 / k).ln() + (params.rate + 0.5 * params.sigma * params.sigma) * t)
            / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        let c = s0 * self.normal.cdf(d1) - k * discount * self.normal.cdf(d2);
        c.max(0.0)
    }
}

impl Default for BlackScholesCall {
    fn default() -> Self {
        Self::new()
    }
}
