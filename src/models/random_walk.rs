use crate::errors::{EngineError, EngineResult};
use crate::models::Simulation;
use crate::state::{WalkParameters, WalkResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Gaussian random walks: each walk is the cumulative sum of N(0,1)
/// increments. Reports the mean/std of the endpoint, the fraction of walks
/// ending strictly above zero and the mean of max |position|.
pub struct RandomWalk {
    params: WalkParameters,
}

impl RandomWalk {
    pub fn new(params: WalkParameters) -> Self {
        Self { params }
    }
}

impl Simulation for RandomWalk {
    type Output = WalkResult;

    #[inline]
    fn name(&self) -> &'static str {
        "Random-Walk"
    }

    fn simulate(&self, seed: u64) -> EngineResult<WalkResult> {
        simulate(seed, &self.params)
    }
}

/// Box-Muller from two uniforms. u1 is drawn from (0, 1] so ln() stays finite.
#[inline]
fn box_muller<R: Rng>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

pub fn simulate(seed: u64, params: &WalkParameters) -> EngineResult<WalkResult> {
    params.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);

    let mut final_sum = 0.0;
    let mut final_sq_sum = 0.0;
    let mut max_disp_sum = 0.0;
    let mut positive: usize = 0;

    for _ in 0..params.n_walks {
        let mut position = 0.0_f64;
        let mut max_abs = 0.0_f64;

        for _ in 0..params.n_steps {
            position += box_muller(&mut rng);
            max_abs = max_abs.max(position.abs());
        }

        final_sum += position;
        final_sq_sum += position * position;
        max_disp_sum += max_abs;
        if position > 0.0 {
            positive += 1;
        }
    }

    let n = params.n_walks as f64;
    let mean_final = final_sum / n;
    // Sample variance (n - 1); a single walk has no spread.
    let var_final = if params.n_walks > 1 {
        ((final_sq_sum - n * mean_final * mean_final) / (n - 1.0)).max(0.0)
    } else {
        0.0
    };

    let result = WalkResult {
        seed,
        mean_final_position: mean_final,
        std_final_position: var_final.sqrt(),
        fraction_positive: positive as f64 / n,
        mean_max_displacement: max_disp_sum / n,
        n_walks: params.n_walks,
        n_steps: params.n_steps,
    };

    if !result.mean_final_position.is_finite() || !result.std_final_position.is_finite() {
        return Err(EngineError::NumericOverflow(format!("non-finite walk statistics for seed {seed}")));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let p = WalkParameters { n_walks: 500, n_steps: 50 };
        assert_eq!(simulate(4, &p).unwrap(), simulate(4, &p).unwrap());
    }

    #[test]
    fn test_symmetric_fraction_near_half() {
        let p = WalkParameters { n_walks: 20_000, n_steps: 10 };
        let r = simulate(1, &p).unwrap();
        assert!((r.fraction_positive - 0.5).abs() < 0.03, "fraction={}", r.fraction_positive);
    }

    #[test]
    fn test_endpoint_spread_is_sqrt_steps() {
        let p = WalkParameters { n_walks: 20_000, n_steps: 25 };
        let r = simulate(2, &p).unwrap();
        // Var(sum of 25 N(0,1)) = 25
        assert!((r.std_final_position - 5.0).abs() < 0.25, "std={}", r.std_final_position);
        assert!(r.mean_final_position.abs() < 0.2, "mean={}", r.mean_final_position);
    }

    #[test]
    fn test_max_displacement_bounds_endpoint() {
        let p = WalkParameters { n_walks: 1, n_steps: 100 };
        let r = simulate(8, &p).unwrap();
        assert!(r.mean_max_displacement >= r.mean_final_position.abs());
        assert_eq!(r.std_final_position, 0.0);
    }

    #[test]
    fn test_box_muller_moments() {
        let mut rng = StdRng::seed_from_u64(99);
        let n = 50_000;
        let draws: Vec<f64> = (0..n).map(|_| box_muller(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean) * (z - mean)).sum::<f64>() / (n as f64 - 1.0);
        assert!(mean.abs() < 0.02, "mean={mean}");
        assert!((var - 1.0).abs() < 0.03, "var={var}");
        assert!(draws.iter().all(|z| z.is_finite()));
    }

    #[test]
    fn test_rejects_empty_walks() {
        let p = WalkParameters { n_walks: 0, n_steps: 10 };
        assert!(matches!(simulate(0, &p), Err(EngineError::InvalidParameter { name: "n_walks", .. })));
    }
}
