pub mod black_scholes;
pub mod monte_carlo;
pub mod random_walk;

use crate::errors::EngineResult;
use crate::results::row::CsvRow;

/// Every per-seed worker implements this trait.
/// simulate() must be a pure function of (seed, configured parameters):
/// the seed is the only entropy source, so reruns reproduce the same row.
/// Send + Sync required so the run can move onto a blocking tokio thread.
pub trait Simulation: Send + Sync {
    type Output: CsvRow + Send + 'static;

    fn name(&self) -> &'static str;

    fn simulate(&self, seed: u64) -> EngineResult<Self::Output>;
}
