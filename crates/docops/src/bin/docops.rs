//! Command line front end: run an operation list over a document, either
//! directly or through the job lifecycle.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use docops::jobs::{JobStatus, ProcessRequest};
use docops::pipeline::{ProgressEvent, ProgressReporter};
use docops::{
    load_operations, load_settings, storage, DocumentFamily, JobError, JobManager, JobStore,
    MemoryJobStore, Pipeline, RunControl, Settings, SqliteJobStore, TaskExecutor,
    TransformRegistry, WorkerPool,
};

#[derive(Parser)]
#[command(name = "docops", version, about = "Apply operation lists to DOCX and PDF documents")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = "DOCOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline in this process
    Run {
        input_file: PathBuf,
        output_file: PathBuf,
        operations_file: PathBuf,
    },
    /// Upload, submit, poll and download through the worker pool
    Job {
        input_file: PathBuf,
        output_file: PathBuf,
        operations_file: PathBuf,
        /// Status polling interval in milliseconds
        #[arg(long, default_value_t = 250)]
        poll_ms: u64,
    },
    /// List supported operation types per document family
    Operations,
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let layer = fmt::layer().with_writer(io::stderr);

    if json {
        let subscriber = tracing_subscriber::registry().with(filter).with(layer.json());
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    // Route `log` records from the worker and store code into tracing.
    LogTracer::init()?;
    Ok(())
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(flag)
}

/// Prints one line per finished step.
#[derive(Default)]
struct StepPrinter {
    total: AtomicUsize,
}

impl ProgressReporter for StepPrinter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total_steps } => {
                self.total.store(total_steps, Ordering::Relaxed);
            }
            ProgressEvent::StepFinished(outcome) => {
                println!(
                    "[{}/{}] {}: {}",
                    outcome.index,
                    self.total.load(Ordering::Relaxed),
                    outcome.operation,
                    outcome.status
                );
            }
            _ => {}
        }
    }
}

/// Validates the inputs of `run`/`job`. Prints the problem and returns
/// `None` when processing should not start.
fn prepare(input: &Path, operations_file: &Path) -> Option<(DocumentFamily, Vec<docops::Operation>)> {
    if !input.is_file() {
        eprintln!("Error: input file not found: {}", input.display());
        return None;
    }
    let Some(family) = DocumentFamily::from_path(input) else {
        eprintln!(
            "Error: unsupported input file type: {} (expected .docx or .pdf)",
            input.display()
        );
        return None;
    };
    if !operations_file.is_file() {
        eprintln!("Error: operations file not found: {}", operations_file.display());
        return None;
    }
    match load_operations(operations_file) {
        Ok(operations) => Some((family, operations)),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn run_command(settings: &Settings, input: &Path, output: &Path, operations_file: &Path) -> Result<ExitCode> {
    let Some((family, operations)) = prepare(input, operations_file) else {
        return Ok(ExitCode::FAILURE);
    };

    let pipeline = Pipeline::new(
        Arc::new(TransformRegistry::new()),
        &settings.workspace_directory,
    );
    let mut control = RunControl::new().with_cancel_flag(interrupt_flag()?);
    if let Some(timeout) = settings.job_timeout() {
        control = control.with_timeout(timeout);
    }

    match pipeline.run(input, family, &operations, output, &control, &StepPrinter::default()) {
        Ok(report) => {
            println!(
                "Processed {} -> {} ({})",
                input.display(),
                report.final_path.display(),
                report.summary()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn open_store(settings: &Settings) -> docops::Result<Arc<dyn JobStore>> {
    Ok(match &settings.database_path {
        Some(path) => Arc::new(SqliteJobStore::open(path).map_err(JobError::from)?),
        None => Arc::new(MemoryJobStore::new()),
    })
}

/// Worker pool plus a manager on top of it.
fn start_jobs(settings: &Settings) -> docops::Result<(Arc<WorkerPool>, JobManager)> {
    let pipeline = Pipeline::new(
        Arc::new(TransformRegistry::new()),
        &settings.workspace_directory,
    );
    let executor = Arc::new(TaskExecutor::new(pipeline, &settings.output_directory));
    let pool = Arc::new(WorkerPool::with_timeout(
        executor,
        settings.worker_count,
        settings.job_timeout(),
    )?);
    let manager = JobManager::from_settings(settings, open_store(settings)?, pool.clone())?;
    Ok((pool, manager))
}

fn job_command(
    settings: &Settings,
    input: &Path,
    output: &Path,
    operations_file: &Path,
    poll: Duration,
) -> Result<ExitCode> {
    let Some((_, operations)) = prepare(input, operations_file) else {
        return Ok(ExitCode::FAILURE);
    };

    let (pool, manager) = start_jobs(settings).context("Failed to start job processing")?;
    let interrupted = interrupt_flag()?;

    let exit = drive_job(&manager, input, output, operations, poll, &interrupted);

    manager.close();
    pool.shutdown();
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.wait(),
        Err(_) => log::warn!("Worker pool still shared, not waiting for workers"),
    }
    exit
}

fn drive_job(
    manager: &JobManager,
    input: &Path,
    output: &Path,
    operations: Vec<docops::Operation>,
    poll: Duration,
    interrupted: &AtomicBool,
) -> Result<ExitCode> {
    let content = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let file = manager.register_upload(filename, &content)?;

    let receipt = manager.submit_file(
        &file.file_id,
        ProcessRequest {
            operations,
            output_filename: output
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
        },
    )?;
    println!("Job {}: {}", receipt.job_id, receipt.message);

    let mut last_status = None;
    let mut cancel_sent = false;
    loop {
        if interrupted.load(Ordering::SeqCst) && !cancel_sent {
            cancel_sent = true;
            manager.cancel(&receipt.job_id)?;
        }

        let status = manager.get_status(&receipt.job_id)?;
        if last_status != Some(status.status) {
            println!("Job {}: {} ({})", status.job_id, status.status, status.message);
            last_status = Some(status.status);
        }

        match status.status {
            JobStatus::Completed => {
                for step in status.steps.iter().filter(|s| !s.is_applied()) {
                    println!("  step {} ({}): {}", step.index, step.operation, step.status);
                }
                break;
            }
            JobStatus::Failed | JobStatus::Unknown => return Ok(ExitCode::FAILURE),
            JobStatus::Queued | JobStatus::Processing => std::thread::sleep(poll),
        }
    }

    let download = manager.retrieve_result(&receipt.job_id)?;
    storage::write_atomic(output, &download.content)?;
    println!(
        "Downloaded {} ({}, {} bytes) to {}",
        download.filename,
        download.content_type,
        download.content.len(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn list_operations() -> ExitCode {
    let registry = TransformRegistry::new();
    for family in [DocumentFamily::WordProcessing, DocumentFamily::Pdf] {
        println!("{} (.{}):", family, family.extension());
        for operation in registry.supported_operations(family) {
            println!("  {}", operation);
        }
    }
    ExitCode::SUCCESS
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    let settings = match &cli.config {
        Some(path) => load_settings(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Run {
            input_file,
            output_file,
            operations_file,
        } => run_command(&settings, &input_file, &output_file, &operations_file),
        Command::Job {
            input_file,
            output_file,
            operations_file,
            poll_ms,
        } => job_command(
            &settings,
            &input_file,
            &output_file,
            &operations_file,
            Duration::from_millis(poll_ms),
        ),
        Command::Operations => Ok(list_operations()),
    }
}
