use crate::errors::{EngineError, EngineResult};

// ── Simulation Parameters ──

/// European call contract plus simulation resolution.
/// Built once per invocation (defaults or config overrides), never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    pub s0: f64,
    pub strike: f64,
    pub rate: f64,
    pub sigma: f64,
    pub maturity: f64,
    pub n_paths: usize,
    pub n_steps: usize,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            s0: 100.0,
            strike: 105.0,
            rate: 0.05,
            sigma: 0.2,
            maturity: 1.0,
            n_paths: 500_000,
            n_steps: 100,
        }
    }
}

impl SimulationParameters {
    /// Reject anything that would make the simulation produce NaN/Inf.
    /// Nothing is clamped: a bad value is a caller error.
    pub fn validate(&self) -> EngineResult<()> {
        require_positive("S0", self.s0)?;
        require_positive("K", self.strike)?;
        require_finite("r", self.rate)?;
        require_positive("sigma", self.sigma)?;
        require_positive("T", self.maturity)?;
        if self.n_paths == 0 {
            return Err(EngineError::invalid("n_paths", "must be > 0"));
        }
        if self.n_steps == 0 {
            return Err(EngineError::invalid("n_steps", "must be > 0"));
        }
        Ok(())
    }

    /// Apply any config-supplied overrides on top of these values.
    pub fn with_overrides(mut self, o: &PricingOverrides) -> Self {
        if let Some(v) = o.s0 {
            self.s0 = v;
        }
        if let Some(v) = o.strike {
            self.strike = v;
        }
        if let Some(v) = o.rate {
            self.rate = v;
        }
        if let Some(v) = o.sigma {
            self.sigma = v;
        }
        if let Some(v) = o.maturity {
            self.maturity = v;
        }
        if let Some(v) = o.n_paths {
            self.n_paths = v;
        }
        if let Some(v) = o.n_steps {
            self.n_steps = v;
        }
        self
    }

    /// Discount factor e^{-rT}.
    #[inline]
    pub fn discount(&self) -> f64 {
        (-self.rate * self.maturity).exp()
    }
}

/// Optional per-field overrides read from the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingOverrides {
    pub s0: Option<f64>,
    pub strike: Option<f64>,
    pub rate: Option<f64>,
    pub sigma: Option<f64>,
    pub maturity: Option<f64>,
    pub n_paths: Option<usize>,
    pub n_steps: Option<usize>,
}

/// Per-step GBM coefficients, computed once before the path loop.
#[derive(Debug, Clone, Copy)]
pub struct StepCoefficients {
    /// (r - sigma^2/2) * dt
    pub drift: f64,
    /// sigma * sqrt(dt)
    pub vol: f64,
    pub log_s0: f64,
}

impl StepCoefficients {
    pub fn new(params: &SimulationParameters) -> Self {
        let dt = params.maturity / params.n_steps as f64;
        Self {
            drift: (params.rate - 0.5 * params.sigma * params.sigma) * dt,
            vol: params.sigma * dt.sqrt(),
            log_s0: params.s0.ln(),
        }
    }
}

// ── Pricing Output ──

/// One pricing run. Echoes every input so downstream aggregation can
/// check what each row was computed with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingResult {
    pub seed: u64,
    pub price: f64,
    pub se: f64,
    pub params: SimulationParameters,
}

// ── Random Walk ──

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParameters {
    pub n_walks: usize,
    pub n_steps: usize,
}

impl Default for WalkParameters {
    fn default() -> Self {
        Self { n_walks: 200_000, n_steps: 500 }
    }
}

impl WalkParameters {
    pub fn validate(&self) -> EngineResult<()> {
        if self.n_walks == 0 {
            return Err(EngineError::invalid("n_walks", "must be > 0"));
        }
        if self.n_steps == 0 {
            return Err(EngineError::invalid("n_steps", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkResult {
    pub seed: u64,
    pub mean_final_position: f64,
    pub std_final_position: f64,
    pub fraction_positive: f64,
    pub mean_max_displacement: f64,
    pub n_walks: usize,
    pub n_steps: usize,
}

// ── Aggregated Summaries ──

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingSummary {
    pub n_simulations: usize,
    pub mean_price: f64,
    pub combined_se: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkSummary {
    pub n_simulations: usize,
    pub mean_fraction_positive: f64,
    pub se_fraction_positive: f64,
    pub mean_max_displacement: f64,
}

fn require_finite(name: &'static str, v: f64) -> EngineResult<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be finite, got {v}")))
    }
}

fn require_positive(name: &'static str, v: f64) -> EngineResult<()> {
    require_finite(name, v)?;
    if v > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be > 0, got {v}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_published_contract() {
        let p = SimulationParameters::default();
        assert_eq!(p.n_paths, 500_000);
        assert_eq!(p.n_steps, 100);
        assert_eq!((p.s0, p.strike, p.rate, p.sigma, p.maturity), (100.0, 105.0, 0.05, 0.2, 1.0));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_fields() {
        let base = SimulationParameters::default();
        let bad = [
            SimulationParameters { s0: 0.0, ..base },
            SimulationParameters { strike: -1.0, ..base },
            SimulationParameters { sigma: 0.0, ..base },
            SimulationParameters { maturity: 0.0, ..base },
            SimulationParameters { n_paths: 0, ..base },
            SimulationParameters { n_steps: 0, ..base },
            SimulationParameters { rate: f64::NAN, ..base },
            SimulationParameters { s0: f64::INFINITY, ..base },
        ];
        for p in bad {
            assert!(
                matches!(p.validate(), Err(EngineError::InvalidParameter { .. })),
                "expected InvalidParameter for {p:?}"
            );
        }
    }

    #[test]
    fn test_negative_rate_is_allowed() {
        let p = SimulationParameters { rate: -0.01, ..Default::default() };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_overrides_only_touch_set_fields() {
        let o = PricingOverrides { strike: Some(110.0), n_paths: Some(1_000), ..Default::default() };
        let p = SimulationParameters::default().with_overrides(&o);
        assert_eq!(p.strike, 110.0);
        assert_eq!(p.n_paths, 1_000);
        assert_eq!(p.s0, 100.0);
        assert_eq!(p.n_steps, 100);
    }

    #[test]
    fn test_step_coefficients() {
        let p = SimulationParameters::default();
        let c = StepCoefficients::new(&p);
        assert!((c.drift - (0.05 - 0.02) * 0.01).abs() < 1e-15);
        assert!((c.vol - 0.02).abs() < 1e-15);
        assert!((c.log_s0 - 100.0_f64.ln()).abs() < 1e-15);
    }
}
