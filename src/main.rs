mod config;
mod errors;
mod models;
mod results;
mod state;
mod tasks;

use crate::errors::{EngineError, EngineResult};
use crate::models::black_scholes::BlackScholesCall;
use crate::models::monte_carlo::EuropeanCallMc;
use crate::models::random_walk::RandomWalk;
use crate::models::Simulation;
use crate::results::{aggregate, mailbox, row};
use crate::state::SimulationParameters;
use crate::tasks::Pipeline;
use std::path::{Path, PathBuf};

const USAGE: &str = "\
usage:
  mc-fanout price <seed> <output_dir>
  mc-fanout walk <seed> <output_dir>
  mc-fanout aggregate <input_dir>
  mc-fanout aggregate-walks <input_dir>
  mc-fanout generate <pricing|walk> [output_file]";

/// Parsed command line. Everything else comes from the environment.
#[derive(Debug, PartialEq)]
enum Command {
    Price { seed: u64, output_dir: PathBuf },
    Walk { seed: u64, output_dir: PathBuf },
    Aggregate { input_dir: PathBuf },
    AggregateWalks { input_dir: PathBuf },
    Generate { pipeline: Pipeline, output: Option<PathBuf> },
}

fn parse_args(args: &[String]) -> EngineResult<Command> {
    let parse_seed = |raw: &str| {
        raw.parse::<u64>()
            .map_err(|e| EngineError::Parse(format!("seed {raw:?}: {e}")))
    };

    let argv: Vec<&str> = args.iter().map(String::as_str).collect();
    match argv.as_slice() {
        ["price", seed, dir] => Ok(Command::Price { seed: parse_seed(seed)?, output_dir: dir.into() }),
        ["walk", seed, dir] => Ok(Command::Walk { seed: parse_seed(seed)?, output_dir: dir.into() }),
        ["aggregate", dir] => Ok(Command::Aggregate { input_dir: dir.into() }),
        ["aggregate-walks", dir] => Ok(Command::AggregateWalks { input_dir: dir.into() }),
        ["generate", kind, rest @ ..] if rest.len() <= 1 => {
            let pipeline = Pipeline::parse(kind)
                .ok_or_else(|| EngineError::Parse(format!("unknown pipeline {kind:?}")))?;
            Ok(Command::Generate { pipeline, output: rest.first().map(PathBuf::from) })
        }
        _ => Err(EngineError::Parse(format!("bad arguments: {}", args.join(" ")))),
    }
}

#[tokio::main]
async fn main() {
    // Structured logging to stderr; stdout stays clean for generated JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(command, &cfg).await {
        tracing::error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

async fn run(command: Command, cfg: &config::AppConfig) -> EngineResult<()> {
    match command {
        Command::Price { seed, output_dir } => {
            let params = SimulationParameters::default().with_overrides(&cfg.pricing);
            run_price(seed, params, &output_dir).await.map(|_| ())
        }
        Command::Walk { seed, output_dir } => {
            run_walk(seed, cfg.walk, &output_dir).await.map(|_| ())
        }
        Command::Aggregate { input_dir } => {
            run_aggregate(&input_dir, &cfg.poll, &cfg.summary_path).await.map(|_| ())
        }
        Command::AggregateWalks { input_dir } => {
            run_aggregate_walks(&input_dir, &cfg.poll, &cfg.summary_path).await.map(|_| ())
        }
        Command::Generate { pipeline, output } => {
            let list = tasks::generate(pipeline, &cfg.tasks);
            list.validate()?;
            if let Some(path) = tasks::emit(&list, output.as_deref())? {
                tracing::info!(count = list.tasks.len(), path = %path.display(), "wrote task list");
            }
            Ok(())
        }
    }
}

/// Run one seed on a blocking thread. The simulation is CPU-bound and
/// touches no shared state, so nothing else needs to coordinate with it.
async fn run_simulation<S>(sim: S, seed: u64) -> EngineResult<S::Output>
where
    S: Simulation + 'static,
{
    let host = hostname();
    tracing::info!(
        model = sim.name(),
        seed,
        host = %host,
        time = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "simulation started"
    );

    let started = std::time::Instant::now();
    let name = sim.name();
    let output = tokio::task::spawn_blocking(move || sim.simulate(seed)).await??;

    tracing::info!(model = name, seed, elapsed_ms = started.elapsed().as_millis() as u64, "simulation complete");
    Ok(output)
}

/// Node name for the start log. Batch shells rarely export `HOSTNAME`,
/// so the kernel's copy is read first.
fn hostname() -> String {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .chain(std::env::var("HOSTNAME").ok())
        .find(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

async fn run_price(seed: u64, params: SimulationParameters, output_dir: &Path) -> EngineResult<PathBuf> {
    let result = run_simulation(EuropeanCallMc::new(params), seed).await?;
    let analytic = BlackScholesCall::new().price(&params);

    tracing::info!(
        seed,
        price = result.price,
        se = result.se,
        black_scholes = analytic,
        "option priced"
    );

    let path = row::write_result(output_dir, seed, &result)?;
    tracing::info!(path = %path.display(), "result saved");
    Ok(path)
}

async fn run_walk(seed: u64, params: state::WalkParameters, output_dir: &Path) -> EngineResult<PathBuf> {
    let result = run_simulation(RandomWalk::new(params), seed).await?;

    tracing::info!(
        seed,
        mean_final_position = result.mean_final_position,
        fraction_positive = result.fraction_positive,
        mean_max_displacement = result.mean_max_displacement,
        "walks finished"
    );

    let path = row::write_result(output_dir, seed, &result)?;
    tracing::info!(path = %path.display(), "result saved");
    Ok(path)
}

async fn run_aggregate(
    input_dir: &Path,
    poll: &mailbox::PollPolicy,
    summary_path: &Path,
) -> EngineResult<state::PricingSummary> {
    tracing::info!(input_dir = %input_dir.display(), "aggregating pricing results");

    let files = mailbox::wait_for_results(input_dir, poll).await?;
    let rows = aggregate::load_pricing_rows(&files)?;
    let summary = aggregate::aggregate_pricing(&rows)?;
    row::write_csv(summary_path, &summary)?;

    tracing::info!(
        simulations = summary.n_simulations,
        mean_price = summary.mean_price,
        combined_se = summary.combined_se,
        min_price = summary.min_price,
        max_price = summary.max_price,
        path = %summary_path.display(),
        "summary written"
    );
    Ok(summary)
}

async fn run_aggregate_walks(
    input_dir: &Path,
    poll: &mailbox::PollPolicy,
    summary_path: &Path,
) -> EngineResult<state::WalkSummary> {
    tracing::info!(input_dir = %input_dir.display(), "aggregating random walk results");

    let files = mailbox::wait_for_results(input_dir, poll).await?;
    let rows = aggregate::load_walk_rows(&files)?;
    let summary = aggregate::aggregate_walks(&rows)?;
    row::write_csv(summary_path, &summary)?;

    tracing::info!(
        simulations = summary.n_simulations,
        mean_fraction_positive = summary.mean_fraction_positive,
        se = summary.se_fraction_positive,
        mean_max_displacement = summary.mean_max_displacement,
        path = %summary_path.display(),
        "summary written"
    );
    Ok(summary)
}
