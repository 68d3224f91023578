use crate::errors::{EngineError, EngineResult};
use crate::state::{PricingResult, PricingSummary, WalkResult, WalkSummary};
use std::fs;
use std::path::{Path, PathBuf};

/// A record that serializes to one CSV header line plus one data line.
pub trait CsvRow {
    fn header() -> &'static [&'static str];
    fn values(&self) -> Vec<String>;
}

impl CsvRow for PricingResult {
    fn header() -> &'static [&'static str] {
        &["seed", "price", "se", "n_paths", "n_steps", "S0", "K", "r", "sigma", "T"]
    }

    fn values(&self) -> Vec<String> {
        let p = &self.params;
        vec![
            self.seed.to_string(),
            self.price.to_string(),
            self.se.to_string(),
            p.n_paths.to_string(),
            p.n_steps.to_string(),
            p.s0.to_string(),
            p.strike.to_string(),
            p.rate.to_string(),
            p.sigma.to_string(),
            p.maturity.to_string(),
        ]
    }
}

impl CsvRow for WalkResult {
    fn header() -> &'static [&'static str] {
        &[
            "seed",
            "mean_final_position",
            "std_final_position",
            "fraction_positive",
            "mean_max_displacement",
            "n_walks",
            "n_steps",
        ]
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.seed.to_string(),
            self.mean_final_position.to_string(),
            self.std_final_position.to_string(),
            self.fraction_positive.to_string(),
            self.mean_max_displacement.to_string(),
            self.n_walks.to_string(),
            self.n_steps.to_string(),
        ]
    }
}

impl CsvRow for PricingSummary {
    fn header() -> &'static [&'static str] {
        &["n_simulations", "mean_price", "combined_se", "min_price", "max_price"]
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.n_simulations.to_string(),
            format!("{:.6}", self.mean_price),
            format!("{:.6}", self.combined_se),
            format!("{:.6}", self.min_price),
            format!("{:.6}", self.max_price),
        ]
    }
}

impl CsvRow for WalkSummary {
    fn header() -> &'static [&'static str] {
        &[
            "n_simulations",
            "mean_fraction_positive",
            "se_fraction_positive",
            "mean_max_displacement",
        ]
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.n_simulations.to_string(),
            format!("{:.6}", self.mean_fraction_positive),
            format!("{:.6}", self.se_fraction_positive),
            format!("{:.4}", self.mean_max_displacement),
        ]
    }
}

/// Mailbox file name for a seed. The aggregator globs on `res_*.csv`.
pub fn result_file_name(seed: u64) -> String {
    format!("res_{seed}.csv")
}

fn render<R: CsvRow>(row: &R) -> String {
    let mut out = R::header().join(",");
    out.push('\n');
    out.push_str(&row.values().join(","));
    out.push('\n');
    out
}

/// Write a single row to `path`, replacing any existing file.
pub fn write_csv<R: CsvRow>(path: &Path, row: &R) -> EngineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(row))?;
    Ok(())
}

/// Deposit a worker result into the mailbox directory as `res_<seed>.csv`.
///
/// Written to a dot-prefixed temp file first and renamed into place, so a
/// concurrent glob never picks up a half-written row.
pub fn write_result<R: CsvRow>(dir: &Path, seed: u64, row: &R) -> EngineResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let final_path = dir.join(result_file_name(seed));
    let tmp_path = dir.join(format!(".res_{seed}.csv.tmp"));
    fs::write(&tmp_path, render(row))?;
    fs::rename(&tmp_path, &final_path)?;
    Ok(final_path)
}

/// One parsed data line, keyed by the header of its file.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_f64(&self, key: &str) -> EngineResult<f64> {
        let raw = self
            .get(key)
            .ok_or_else(|| EngineError::Parse(format!("missing column {key}")))?;
        raw.trim()
            .parse::<f64>()
            .map_err(|e| EngineError::Parse(format!("column {key}={raw:?}: {e}")))
    }
}

/// Parse a header + data-lines CSV file. Blank lines are skipped; a data
/// line whose width differs from the header is a parse error.
pub fn read_records(path: &Path) -> EngineResult<Vec<Record>> {
    let text = fs::read_to_string(path)?;
    parse_records(&text).map_err(|e| match e {
        EngineError::Parse(msg) => EngineError::Parse(format!("{}: {msg}", path.display())),
        other => other,
    })
}

fn parse_records(text: &str) -> EngineResult<Vec<Record>> {
    let mut lines = text.lines().map(str::trim_end).filter(|l| !l.trim().is_empty());

    let header: Vec<String> = match lines.next() {
        Some(h) => h.split(',').map(|s| s.trim().to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    lines
        .enumerate()
        .map(|(i, line)| {
            let values: Vec<&str> = line.split(',').collect();
            if values.len() != header.len() {
                return Err(EngineError::Parse(format!(
                    "line {}: expected {} fields, got {}",
                    i + 2,
                    header.len(),
                    values.len()
                )));
            }
            let fields = header
                .iter()
                .cloned()
                .zip(values.into_iter().map(|v| v.trim().to_string()))
                .collect();
            Ok(Record { fields })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SimulationParameters;

    fn sample() -> PricingResult {
        PricingResult { seed: 3, price: 8.01, se: 0.02, params: SimulationParameters::default() }
    }

    #[test]
    fn test_pricing_row_layout() {
        let text = render(&sample());
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("seed,price,se,n_paths,n_steps,S0,K,r,sigma,T"));
        assert_eq!(lines.next(), Some("3,8.01,0.02,500000,100,100,105,0.05,0.2,1"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_summary_fixed_precision() {
        let s = PricingSummary {
            n_simulations: 2,
            mean_price: 8.0,
            combined_se: 0.1118033988,
            min_price: 7.9,
            max_price: 8.1,
        };
        assert_eq!(s.values(), vec!["2", "8.000000", "0.111803", "7.900000", "8.100000"]);
    }

    #[test]
    fn test_write_result_lands_in_mailbox() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_result(dir.path(), 3, &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), "res_3.csv");

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("seed"), Some("3"));
        assert!((records[0].get_f64("price").unwrap() - 8.01).abs() < 1e-12);

        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_write_result_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("temp").join("run");
        write_result(&nested, 0, &sample()).unwrap();
        assert!(nested.join("res_0.csv").exists());
    }

    #[test]
    fn test_parse_rejects_ragged_lines() {
        let err = parse_records("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_parse_multiple_rows_and_blank_lines() {
        let records = parse_records("price,se\n1.0,0.1\n\n2.0,0.2\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get_f64("se").unwrap(), 0.2);
        assert!(records[0].get_f64("missing").is_err());
    }

    #[test]
    fn test_non_numeric_field_is_parse_error() {
        let records = parse_records("price,se\nabc,0.1\n").unwrap();
        assert!(matches!(records[0].get_f64("price"), Err(EngineError::Parse(_))));
    }
}
