use crate::errors::{EngineError, EngineResult};
use crate::results::mailbox::PollPolicy;
use crate::state::{PricingOverrides, WalkParameters};
use crate::tasks::{TaskSettings, DEFAULT_CONTAINER_ENV_UNSET};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pricing: PricingOverrides,
    pub walk: WalkParameters,
    pub summary_path: PathBuf,
    pub poll: PollPolicy,
    pub tasks: TaskSettings,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let pricing = PricingOverrides {
            s0: env_parse_opt("PRICER_S0")?,
            strike: env_parse_opt("PRICER_STRIKE")?,
            rate: env_parse_opt("PRICER_RATE")?,
            sigma: env_parse_opt("PRICER_SIGMA")?,
            maturity: env_parse_opt("PRICER_MATURITY")?,
            n_paths: env_parse_opt("PRICER_PATHS")?,
            n_steps: env_parse_opt("PRICER_STEPS")?,
        };

        let walk_defaults = WalkParameters::default();
        let walk = WalkParameters {
            n_walks: env_parse("WALK_COUNT", walk_defaults.n_walks)?,
            n_steps: env_parse("WALK_STEPS", walk_defaults.n_steps)?,
        };

        let poll = PollPolicy {
            attempts: env_parse("AGGREGATE_POLL_ATTEMPTS", 0)?,
            interval: Duration::from_secs(env_parse("AGGREGATE_POLL_INTERVAL_SECS", 5)?),
            min_results: env_parse("AGGREGATE_MIN_RESULTS", 1)?,
            marker: env_var_opt("AGGREGATE_MARKER"),
        };

        let working_dir = match env_var_opt("TASK_WORKING_DIR") {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| EngineError::Config(format!("TASK_WORKING_DIR: {e}")))?
                .display()
                .to_string(),
        };

        let tasks = TaskSettings {
            count: env_parse("TASK_COUNT", 5)?,
            working_dir,
            partition: env_var_or("TASK_PARTITION", "standard"),
            prefix: env_var_or("TASK_PREFIX", ""),
            environment: env_var_opt("TASK_ENVIRONMENT"),
            cpus: env_parse("TASK_CPUS", 1)?,
            memory: env_var_opt("TASK_MEMORY"),
            time_limit: env_var_or("TASK_TIME_LIMIT", "00:05:00"),
            results_dir: env_var_or("TASK_RESULTS_DIR", "temp"),
            worker_command: env_var_or("WORKER_COMMAND", "mc-fanout"),
            container_image: env_var_opt("CONTAINER_IMAGE"),
            container_env_unset: env_list_or("CONTAINER_ENV_UNSET", &DEFAULT_CONTAINER_ENV_UNSET),
        };

        Ok(Self {
            pricing,
            walk,
            summary_path: PathBuf::from(env_var_or("SUMMARY_PATH", "results.csv")),
            poll,
            tasks,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and empty are both treated as absent.
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var_opt(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn env_parse_opt<T>(key: &str) -> EngineResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_opt(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn parse_value<T>(key: &str, raw: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

/// Comma-separated list. Unset falls back to `default`; set-but-empty
/// means an explicitly empty list.
fn env_list_or(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => split_list(&raw),
        Err(_) => default.iter().map(|v| v.to_string()).collect(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<f64>("PRICER_S0", "abc").unwrap_err();
        assert!(err.to_string().contains("PRICER_S0"), "error should name the variable: {err}");
        assert_eq!(parse_value::<usize>("PRICER_PATHS", " 1000 ").unwrap(), 1000);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("PYTHONHOME, PYTHONPATH,,"), vec!["PYTHONHOME", "PYTHONPATH"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_unset_keys_fall_back() {
        let key = "MC_FANOUT_TEST_SURELY_UNSET_KEY";
        assert_eq!(env_parse::<u32>(key, 7).unwrap(), 7);
        assert_eq!(env_parse_opt::<f64>(key).unwrap(), None);
        assert_eq!(env_var_or(key, "x"), "x");
        assert_eq!(env_list_or(key, &DEFAULT_CONTAINER_ENV_UNSET), vec!["PYTHONHOME", "PYTHONPATH"]);
    }
}
