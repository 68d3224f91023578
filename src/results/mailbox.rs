use crate::errors::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Glob every worker writes into (see `row::result_file_name`).
const RESULT_PATTERN: &str = "res_*.csv";

/// How long the aggregator waits for the mailbox to fill.
///
/// Shared filesystems can lag behind the scheduler's "all done" signal, so
/// the aggregator may poll before giving up. Readiness means at least
/// `min_results` files and, when configured, the completion marker file.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Extra checks after the first one (0 = look once).
    pub attempts: u32,
    pub interval: Duration,
    pub min_results: usize,
    pub marker: Option<String>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 0,
            interval: Duration::from_secs(5),
            min_results: 1,
            marker: None,
        }
    }
}

/// Sorted list of result files currently in `dir`.
pub fn discover(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{base}/{RESULT_PATTERN}");

    let mut files = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
    files.sort();
    Ok(files)
}

fn is_ready(dir: &Path, files: &[PathBuf], policy: &PollPolicy) -> bool {
    let marker_ok = policy.marker.as_ref().map_or(true, |m| dir.join(m).exists());
    files.len() >= policy.min_results.max(1) && marker_ok
}

/// Poll the mailbox until it is ready or the attempts run out.
///
/// Whatever is present after the last attempt is returned (partial results
/// are aggregated); an empty mailbox is `NoResults`.
pub async fn wait_for_results(dir: &Path, policy: &PollPolicy) -> EngineResult<Vec<PathBuf>> {
    let mut files = discover(dir)?;
    let mut attempt = 0;

    while !is_ready(dir, &files, policy) && attempt < policy.attempts {
        attempt += 1;
        tracing::warn!(
            dir = %dir.display(),
            found = files.len(),
            attempt,
            max_attempts = policy.attempts,
            "mailbox not ready, retrying in {:?}",
            policy.interval
        );
        tokio::time::sleep(policy.interval).await;
        files = discover(dir)?;
    }

    if files.is_empty() {
        return Err(EngineError::NoResults(dir.display().to_string()));
    }

    if !is_ready(dir, &files, policy) {
        tracing::warn!(
            found = files.len(),
            expected = policy.min_results,
            marker = ?policy.marker,
            "aggregating partial results"
        );
    }

    tracing::info!(dir = %dir.display(), count = files.len(), "found result files");
    Ok(files)
}
