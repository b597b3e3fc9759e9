//! `orbit`: run task batches, validate tool arguments and inspect the
//! effective configuration from the command line.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{CliConfig, LoggingConfig};
use futures_util::future::join_all;
use orbit_agent::{Agent, RetryingAgent};
use orbit_context::InMemoryContextProvider;
use orbit_orchestrator::{Orchestrator, Task};
use orbit_tools::{check_schema, validate_args, ToolSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "orbit.toml";

#[derive(Parser)]
#[command(name = "orbit", about = "Orbit: concurrent task orchestration engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of tasks against the configured agents
    Run {
        /// JSON file holding an array of tasks (or bare inputs)
        #[arg(short, long)]
        tasks: Option<PathBuf>,

        /// Inline task input; parsed as JSON when possible
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Print lifecycle events to stderr
        #[arg(long)]
        events: bool,
    },
    /// Validate tool arguments against a tool schema document
    Validate {
        /// JSON file holding the tool schema
        #[arg(short, long)]
        schema: PathBuf,

        /// Arguments as inline JSON
        #[arg(short, long)]
        args: String,
    },
    /// Print the effective configuration
    Config,
}

/// One entry of a tasks file: a full task, or just its input.
#[derive(Deserialize)]
#[serde(untagged)]
enum TaskEntry {
    Full(Task),
    Input(Value),
}

impl From<TaskEntry> for Task {
    fn from(entry: TaskEntry) -> Self {
        match entry {
            TaskEntry::Full(task) => task,
            TaskEntry::Input(input) => Task::with_generated_id(input),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config, cli.config != Path::new(DEFAULT_CONFIG))?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run {
            tasks,
            inputs,
            events,
        } => run(config, tasks.as_deref(), inputs, events).await,
        Commands::Validate { schema, args } => validate(&schema, &args),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_orchestrator(config: &CliConfig) -> anyhow::Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new(config.orchestrator.clone())?;
    if let Some(context) = &config.context {
        orchestrator =
            orchestrator.with_context(Arc::new(InMemoryContextProvider::new(context.clone())));
    }

    if config.agents.is_empty() {
        info!("No agents configured, registering a default echo agent");
        orchestrator.add_agent(Arc::new(orbit_agent::EchoAgent::new("echo")));
    }
    for agent_config in &config.agents {
        let agent: Arc<dyn Agent> = Arc::new(agent_config.build());
        let agent: Arc<dyn Agent> = if agent_config.retry {
            let mut retrying = RetryingAgent::new(agent);
            if let Some(strategy) = &config.orchestrator.retry_strategy {
                retrying = retrying.with_strategy(strategy.clone());
            }
            Arc::new(retrying)
        } else {
            agent
        };
        orchestrator.add_agent(agent);
    }
    Ok(orchestrator)
}

async fn load_tasks(path: Option<&Path>, inputs: Vec<String>) -> anyhow::Result<Vec<Task>> {
    let mut tasks = Vec::new();
    if let Some(path) = path {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read tasks file '{}'", path.display()))?;
        let entries: Vec<TaskEntry> = serde_json::from_str(&source)
            .with_context(|| format!("Invalid tasks file '{}'", path.display()))?;
        tasks.extend(entries.into_iter().map(Task::from));
    }
    for raw in inputs {
        let input = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        tasks.push(Task::with_generated_id(input));
    }
    anyhow::ensure!(!tasks.is_empty(), "no tasks given; pass --tasks or --input");
    Ok(tasks)
}

async fn run(
    config: CliConfig,
    tasks_path: Option<&Path>,
    inputs: Vec<String>,
    events: bool,
) -> anyhow::Result<()> {
    let tasks = load_tasks(tasks_path, inputs).await?;
    let orchestrator = build_orchestrator(&config)?;

    let printer = events.then(|| {
        let mut rx = orchestrator.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => eprintln!("{line}"),
                        Err(e) => warn!(error = %e, "Unprintable event"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event printer lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    });

    orchestrator
        .initialize()
        .await
        .context("Agent initialization failed")?;
    info!(tasks = tasks.len(), "Submitting tasks");

    let outcomes = join_all(tasks.into_iter().map(|task| {
        let orchestrator = &orchestrator;
        async move {
            let id = task.id.clone();
            match orchestrator.submit_task(task).await {
                Ok(result) => json!(result),
                Err(e) => match e.task_result() {
                    Some(result) => json!(result),
                    None => json!({ "task_id": id, "rejected": e.to_string() }),
                },
            }
        }
    }))
    .await;

    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    println!("{}", serde_json::to_string_pretty(&orchestrator.metrics())?);

    orchestrator.shutdown().await;
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    Ok(())
}

fn validate(schema_path: &Path, args: &str) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read schema file '{}'", schema_path.display()))?;
    let schema: ToolSchema = serde_json::from_str(&source)
        .with_context(|| format!("Invalid schema file '{}'", schema_path.display()))?;
    check_schema(&schema.parameters)?;

    let args: Value = serde_json::from_str(args).context("Arguments are not valid JSON")?;
    validate_args(&args, &schema)?;
    println!("Arguments are valid for '{}'", schema.name);
    Ok(())
}
