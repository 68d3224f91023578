pub mod graph;

use crate::errors::EngineResult;
use std::path::{Path, PathBuf};

/// One job for the external scheduler. Field order is the JSON order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub command: String,
    pub working_dir: String,
    pub partition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub cpus: u32,
    pub memory: String,
    pub time_limit: String,
    /// Task ids or `*` wildcard patterns that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

/// Which worker the fan-out leaves run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Pricing,
    RandomWalk,
}

impl Pipeline {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pricing" | "price" => Some(Self::Pricing),
            "walk" | "random-walk" => Some(Self::RandomWalk),
            _ => None,
        }
    }

    /// Leaf id stem; the fan-in depends on `<prefix><stem>.*`.
    fn stem(self) -> &'static str {
        match self {
            Self::Pricing => "pricing",
            Self::RandomWalk => "sim",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Pricing => "Pricing",
            Self::RandomWalk => "Simulation",
        }
    }

    fn worker_subcommand(self) -> &'static str {
        match self {
            Self::Pricing => "price",
            Self::RandomWalk => "walk",
        }
    }

    fn aggregate_subcommand(self) -> &'static str {
        match self {
            Self::Pricing => "aggregate",
            Self::RandomWalk => "aggregate-walks",
        }
    }

    /// Leaf memory when not configured. Walk leaves keep 200k walks in flight.
    fn leaf_memory(self) -> &'static str {
        match self {
            Self::Pricing => "1G",
            Self::RandomWalk => "2G",
        }
    }
}

/// Everything the generator needs, injected from config.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub count: u32,
    pub working_dir: String,
    pub partition: String,
    pub prefix: String,
    pub environment: Option<String>,
    pub cpus: u32,
    pub memory: Option<String>,
    pub time_limit: String,
    pub results_dir: String,
    pub worker_command: String,
    /// Apptainer image the leaves run inside, if any.
    pub container_image: Option<String>,
    /// Variables scrubbed from the host environment before entering the container.
    pub container_env_unset: Vec<String>,
}

/// Host Python variables that would leak into the container's interpreter.
pub const DEFAULT_CONTAINER_ENV_UNSET: [&str; 2] = ["PYTHONHOME", "PYTHONPATH"];

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            count: 5,
            working_dir: ".".into(),
            partition: "standard".into(),
            prefix: String::new(),
            environment: None,
            cpus: 1,
            memory: None,
            time_limit: "00:05:00".into(),
            results_dir: "temp".into(),
            worker_command: "mc-fanout".into(),
            container_image: None,
            container_env_unset: DEFAULT_CONTAINER_ENV_UNSET.iter().map(|v| v.to_string()).collect(),
        }
    }
}

fn leaf_command(pipeline: Pipeline, settings: &TaskSettings, seed: u32) -> String {
    let base = format!(
        "{} {} {seed} {}",
        settings.worker_command,
        pipeline.worker_subcommand(),
        settings.results_dir
    );

    let Some(image) = &settings.container_image else {
        return base;
    };

    let mut cmd = String::new();
    if !settings.container_env_unset.is_empty() {
        cmd.push_str("env");
        for var in &settings.container_env_unset {
            cmd.push_str(" -u ");
            cmd.push_str(var);
        }
        cmd.push(' ');
    }
    cmd.push_str(&format!("apptainer exec {image} {base}"));
    cmd
}

/// Build the fan-out/fan-in task list: `count` independent leaves seeded
/// `0..count`, plus one aggregate task depending on all of them by wildcard.
pub fn generate(pipeline: Pipeline, settings: &TaskSettings) -> TaskList {
    let prefix = &settings.prefix;
    let leaf_memory = settings
        .memory
        .clone()
        .unwrap_or_else(|| pipeline.leaf_memory().to_string());
    // Containerized leaves get their environment from the image.
    let leaf_environment = match settings.container_image {
        Some(_) => None,
        None => settings.environment.clone(),
    };

    let mut tasks: Vec<Task> = (0..settings.count)
        .map(|i| Task {
            id: format!("{prefix}{}.{i}", pipeline.stem()),
            name: format!("{} {i}", pipeline.display_name()),
            command: leaf_command(pipeline, settings, i),
            working_dir: settings.working_dir.clone(),
            partition: settings.partition.clone(),
            environment: leaf_environment.clone(),
            cpus: settings.cpus,
            memory: leaf_memory.clone(),
            time_limit: settings.time_limit.clone(),
            deps: Vec::new(),
        })
        .collect();

    tasks.push(Task {
        id: format!("{prefix}aggregate"),
        name: "Aggregate Results".into(),
        command: format!(
            "{} {} {}",
            settings.worker_command,
            pipeline.aggregate_subcommand(),
            settings.results_dir
        ),
        working_dir: settings.working_dir.clone(),
        partition: settings.partition.clone(),
        environment: settings.environment.clone(),
        cpus: 1,
        memory: settings.memory.clone().unwrap_or_else(|| "1G".into()),
        time_limit: settings.time_limit.clone(),
        deps: vec![format!("{prefix}{}.*", pipeline.stem())],
    });

    TaskList { tasks }
}

/// Write pretty JSON to `output`, or return it for stdout when `None`.
pub fn emit(list: &TaskList, output: Option<&Path>) -> EngineResult<Option<PathBuf>> {
    let json = serde_json::to_string_pretty(list)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)?;
            Ok(Some(path.to_path_buf()))
        }
        None => {
            println!("{json}");
            Ok(None)
        }
    }
}
