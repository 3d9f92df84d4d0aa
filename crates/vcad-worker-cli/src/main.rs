//! vcad-worker - run call scripts against kernel workers
//!
//! Starts one in-process worker per selected kernel, waits for every kernel
//! to report ready, then replays a JSON call script. Each repetition is one
//! run, bracketed by the cache boundary calls, and every result is printed
//! as a JSON line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use vcad_kernels::{KernelOrchestrator, OrchestratorConfig, Readiness};
use vcad_worker_host::{spawn_worker, ShapeKernel, WorkerHandle};
use vcad_worker_protocol::KernelKind;

mod logging;
mod script;

#[derive(Parser)]
#[command(name = "vcad-worker")]
#[command(about = "Run JSON call scripts against vcad kernel workers", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a call script
    Run {
        /// JSON array of {functionName, inputs, kernel?} steps
        script: PathBuf,
        /// Kernel config (TOML); defaults to the occt kernel alone
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of runs of the script
        #[arg(short, long, default_value_t = 1)]
        repeat: u32,
    },
    /// Validate a kernel config file
    CheckConfig {
        /// Path to the TOML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            script,
            config,
            repeat,
        } => run_script(&script, config.as_deref(), repeat).await?,
        Commands::CheckConfig { file } => check_config(&file)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    let mut config = match path {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    if config.kernels.is_empty() {
        config.kernels.push(KernelKind::Occt);
    }
    Ok(config)
}

async fn run_script(path: &Path, config: Option<&Path>, repeat: u32) -> Result<()> {
    let steps = script::load(path)?;
    let config = load_config(config)?;

    let mut orchestrator = KernelOrchestrator::new(config);
    let handles: Arc<Mutex<Vec<WorkerHandle>>> = Arc::default();
    let spawned = Arc::clone(&handles);
    orchestrator.start(move |kind| {
        let (transport, handle) =
            spawn_worker(ShapeKernel::new(kind)).map_err(|err| err.to_string())?;
        if let Ok(mut handles) = spawned.lock() {
            handles.push(handle);
        }
        Ok(transport)
    });
    orchestrator.on_error(|kind, error| warn!(kernel = %kind, %error, "kernel call failed"));

    let outcome = drive(&orchestrator, &steps, repeat).await;

    orchestrator.dispose();
    let handles = handles
        .lock()
        .map(|mut handles| std::mem::take(&mut *handles))
        .unwrap_or_default();
    for handle in handles {
        let kind = handle.kind();
        tokio::task::spawn_blocking(move || handle.join())
            .await?
            .with_context(|| format!("{kind} worker failed"))?;
    }

    outcome
}

async fn drive(orchestrator: &KernelOrchestrator, steps: &[script::Step], repeat: u32) -> Result<()> {
    let kernels = match orchestrator.initialise().await? {
        Readiness::NothingSelected => {
            info!("no kernels selected, nothing to run");
            return Ok(());
        }
        Readiness::Ready(kernels) => kernels,
    };
    let default_kernel = kernels[0];

    for run in 0..repeat {
        orchestrator.begin_run().await?;
        let mut results: Vec<Value> = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let kind = step.kernel.unwrap_or(default_kernel);
            let manager = orchestrator
                .manager(kind)
                .with_context(|| format!("step {index} targets kernel {kind}, which is not selected"))?;
            let inputs = script::resolve(&step.inputs, &results)
                .with_context(|| format!("step {index}"))?;
            let result = manager
                .call(&step.function_name, inputs)
                .await
                .with_context(|| format!("step {index} ({})", step.function_name))?;
            println!(
                "{}",
                json!({
                    "run": run,
                    "step": index,
                    "kernel": kind,
                    "functionName": step.function_name,
                    "result": result,
                })
            );
            results.push(result);
        }
        orchestrator.end_run().await?;
        info!(run, steps = steps.len(), "run complete");
    }

    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = OrchestratorConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    println!("Config: {}", path.display());
    let selection = config.selection();
    if selection.is_empty() {
        println!("  Kernels: (none selected)");
    } else {
        let names: Vec<&str> = selection.iter().map(|kind| kind.name()).collect();
        println!("  Kernels: {}", names.join(", "));
    }
    match config.init_timeout() {
        Some(after) => println!("  Init timeout: {after:?}"),
        None => println!("  Init timeout: none"),
    }
    match config.manager.call_timeout() {
        Some(after) => println!("  Call timeout: {after:?}"),
        None => println!("  Call timeout: none"),
    }
    println!("  Unmatched replies: {:?}", config.manager.unmatched_reply);

    Ok(())
}
