//! Fan-in aggregation over per-seed result rows.
//! All functions are pure -- they take parsed rows and return summaries.
use crate::errors::{EngineError, EngineResult};
use crate::results::row::{read_records, Record};
use crate::state::{PricingSummary, WalkSummary};
use std::path::PathBuf;

/// The two columns of a pricing row the summary needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingRow {
    pub price: f64,
    pub se: f64,
}

impl PricingRow {
    fn from_record(r: &Record) -> EngineResult<Self> {
        Ok(Self { price: r.get_f64("price")?, se: r.get_f64("se")? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkRow {
    pub fraction_positive: f64,
    pub mean_max_displacement: f64,
}

impl WalkRow {
    fn from_record(r: &Record) -> EngineResult<Self> {
        Ok(Self {
            fraction_positive: r.get_f64("fraction_positive")?,
            mean_max_displacement: r.get_f64("mean_max_displacement")?,
        })
    }
}

fn load<T>(files: &[PathBuf], parse: fn(&Record) -> EngineResult<T>) -> EngineResult<Vec<T>> {
    let mut rows = Vec::with_capacity(files.len());
    for path in files {
        for record in read_records(path)? {
            rows.push(parse(&record)?);
        }
    }
    Ok(rows)
}

pub fn load_pricing_rows(files: &[PathBuf]) -> EngineResult<Vec<PricingRow>> {
    load(files, PricingRow::from_record)
}

pub fn load_walk_rows(files: &[PathBuf]) -> EngineResult<Vec<WalkRow>> {
    load(files, WalkRow::from_record)
}

/// Combine independent per-seed estimates.
///
/// combined_se = sqrt(sum(se_i^2)) / n, the SE of the mean of n
/// independent estimates.
pub fn aggregate_pricing(rows: &[PricingRow]) -> EngineResult<PricingSummary> {
    if rows.is_empty() {
        return Err(EngineError::NoResults("no pricing rows to aggregate".into()));
    }

    let n = rows.len() as f64;
    let mean_price = rows.iter().map(|r| r.price).sum::<f64>() / n;
    let combined_se = rows.iter().map(|r| r.se * r.se).sum::<f64>().sqrt() / n;
    let min_price = rows.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);
    let max_price = rows.iter().map(|r| r.price).fold(f64::NEG_INFINITY, f64::max);

    Ok(PricingSummary {
        n_simulations: rows.len(),
        mean_price,
        combined_se,
        min_price,
        max_price,
    })
}

/// se_fraction_positive is the standard error of the mean across seeds,
/// sqrt(sum((x - mean)^2) / (n * (n - 1))); zero for a single seed.
pub fn aggregate_walks(rows: &[WalkRow]) -> EngineResult<WalkSummary> {
    if rows.is_empty() {
        return Err(EngineError::NoResults("no walk rows to aggregate".into()));
    }

    let n = rows.len() as f64;
    let mean_frac = rows.iter().map(|r| r.fraction_positive).sum::<f64>() / n;
    let mean_disp = rows.iter().map(|r| r.mean_max_displacement).sum::<f64>() / n;
    let se_frac = if rows.len() > 1 {
        let ss = rows
            .iter()
            .map(|r| (r.fraction_positive - mean_frac) * (r.fraction_positive - mean_frac))
            .sum::<f64>();
        (ss / (n * (n - 1.0))).sqrt()
    } else {
        0.0
    };

    Ok(WalkSummary {
        n_simulations: rows.len(),
        mean_fraction_positive: mean_frac,
        se_fraction_positive: se_frac,
        mean_max_displacement: mean_disp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::monte_carlo;
    use crate::models::random_walk;
    use crate::results::mailbox;
    use crate::results::row::write_result;
    use crate::state::{SimulationParameters, WalkParameters};

    #[test]
    fn test_combined_se_two_rows() {
        let rows = [PricingRow { price: 8.0, se: 0.1 }, PricingRow { price: 8.2, se: 0.2 }];
        let s = aggregate_pricing(&rows).unwrap();
        assert_eq!(s.n_simulations, 2);
        assert!((s.combined_se - 0.05_f64.sqrt() / 2.0).abs() < 1e-12);
        assert!((s.combined_se - 0.1118).abs() < 1e-4, "combined_se={}", s.combined_se);
        assert!((s.mean_price - 8.1).abs() < 1e-12);
        assert_eq!(s.min_price, 8.0);
        assert_eq!(s.max_price, 8.2);
    }

    #[test]
    fn test_aggregation_idempotent() {
        let rows = [
            PricingRow { price: 7.9, se: 0.03 },
            PricingRow { price: 8.1, se: 0.02 },
            PricingRow { price: 8.0, se: 0.025 },
        ];
        assert_eq!(aggregate_pricing(&rows).unwrap(), aggregate_pricing(&rows).unwrap());
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(aggregate_pricing(&[]), Err(EngineError::NoResults(_))));
        assert!(matches!(aggregate_walks(&[]), Err(EngineError::NoResults(_))));
    }

    #[test]
    fn test_walk_summary() {
        let rows = [
            WalkRow { fraction_positive: 0.4, mean_max_displacement: 10.0 },
            WalkRow { fraction_positive: 0.6, mean_max_displacement: 12.0 },
        ];
        let s = aggregate_walks(&rows).unwrap();
        assert!((s.mean_fraction_positive - 0.5).abs() < 1e-12);
        assert!((s.mean_max_displacement - 11.0).abs() < 1e-12);
        // sqrt((0.01 + 0.01) / 2) = 0.1
        assert!((s.se_fraction_positive - 0.1).abs() < 1e-12);

        let single = aggregate_walks(&rows[..1]).unwrap();
        assert_eq!(single.se_fraction_positive, 0.0);
    }

    #[tokio::test]
    async fn test_five_seeds_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let params = SimulationParameters { n_paths: 2_000, n_steps: 10, ..Default::default() };

        for seed in 0..5 {
            let result = monte_carlo::simulate(seed, &params).unwrap();
            write_result(dir.path(), seed, &result).unwrap();
        }

        let files = mailbox::wait_for_results(dir.path(), &mailbox::PollPolicy::default())
            .await
            .unwrap();
        let rows = load_pricing_rows(&files).unwrap();
        let summary = aggregate_pricing(&rows).unwrap();

        assert_eq!(summary.n_simulations, 5);
        assert!(summary.min_price <= summary.mean_price && summary.mean_price <= summary.max_price);

        // Re-reading the same mailbox gives the same summary.
        let again = aggregate_pricing(&load_pricing_rows(&files).unwrap()).unwrap();
        assert_eq!(summary, again);
    }

    #[test]
    fn test_walk_rows_round_trip_through_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let params = WalkParameters { n_walks: 200, n_steps: 20 };
        for seed in 0..3 {
            let r = random_walk::simulate(seed, &params).unwrap();
            write_result(dir.path(), seed, &r).unwrap();
        }
        let files = mailbox::discover(dir.path()).unwrap();
        let summary = aggregate_walks(&load_walk_rows(&files).unwrap()).unwrap();
        assert_eq!(summary.n_simulations, 3);
        assert!((0.0..=1.0).contains(&summary.mean_fraction_positive));
    }

    #[test]
    fn test_missing_column_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res_0.csv");
        std::fs::write(&path, "seed,price\n0,1.0\n").unwrap();
        assert!(matches!(load_pricing_rows(&[path]), Err(EngineError::Parse(_))));
    }
}
