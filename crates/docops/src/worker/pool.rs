use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::pipeline::runner::panic_message;
use crate::pipeline::{ProgressEvent, ProgressReporter, RunControl};
use crate::storage;

use super::queue::{TaskQueue, TaskState};
use super::task::{PipelineTask, TaskExecutor};

struct TaskEntry {
    state: TaskState,
    cancel: Arc<AtomicBool>,
}

type TaskTable = Arc<RwLock<HashMap<String, TaskEntry>>>;

fn read_table(table: &RwLock<HashMap<String, TaskEntry>>) -> RwLockReadGuard<'_, HashMap<String, TaskEntry>> {
    match table.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Task table read lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_table(table: &RwLock<HashMap<String, TaskEntry>>) -> RwLockWriteGuard<'_, HashMap<String, TaskEntry>> {
    match table.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Task table write lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Revoked is sticky: a run that slipped past the revocation keeps that state
/// and its output directory is dropped. The same goes for a run whose task
/// was already forgotten, since nobody will collect its result.
fn set_state(table: &RwLock<HashMap<String, TaskEntry>>, task_id: &str, state: TaskState) {
    let mut tasks = write_table(table);
    let Some(entry) = tasks.get_mut(task_id) else {
        if let TaskState::Succeeded(output) = state {
            debug!("Discarding result of forgotten task {}", task_id);
            storage::remove_dir_tolerant(&output.output_dir);
        }
        return;
    };
    if matches!(entry.state, TaskState::Revoked) {
        if let TaskState::Succeeded(output) = state {
            storage::remove_dir_tolerant(&output.output_dir);
        }
        return;
    }
    entry.state = state;
}

/// Thread pool running pipeline tasks from a bounded channel.
pub struct WorkerPool {
    job_sender: Sender<(String, PipelineTask)>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    tasks: TaskTable,
}

impl WorkerPool {
    pub fn new(executor: Arc<TaskExecutor>, worker_count: usize) -> Result<Self, WorkerError> {
        Self::with_timeout(executor, worker_count, None)
    }

    /// Creates a pool whose runs stop at the first step boundary after
    /// `timeout` has elapsed.
    pub fn with_timeout(
        executor: Arc<TaskExecutor>,
        worker_count: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed("worker_count must be > 0".to_string()));
        }

        let (job_sender, job_receiver) = bounded::<(String, PipelineTask)>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let tasks: TaskTable = Arc::new(RwLock::new(HashMap::new()));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_executor = Arc::clone(&executor);
            let worker_tasks = Arc::clone(&tasks);

            let handle = thread::Builder::new()
                .name(format!("docops-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        shutdown_flag,
                        worker_executor,
                        worker_tasks,
                        timeout,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            workers,
            shutdown,
            tasks,
        })
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl TaskQueue for WorkerPool {
    fn submit(&self, task_id: &str, task: PipelineTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        write_table(&self.tasks).insert(
            task_id.to_string(),
            TaskEntry {
                state: TaskState::Pending,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );

        if self.job_sender.send((task_id.to_string(), task)).is_err() {
            write_table(&self.tasks).remove(task_id);
            return Err(WorkerError::ChannelClosed);
        }
        debug!("Queued task {}", task_id);
        Ok(())
    }

    fn poll(&self, task_id: &str) -> TaskState {
        read_table(&self.tasks)
            .get(task_id)
            .map(|entry| entry.state.clone())
            .unwrap_or(TaskState::Unknown)
    }

    fn revoke(&self, task_id: &str) -> bool {
        let mut tasks = write_table(&self.tasks);
        let Some(entry) = tasks.get_mut(task_id) else {
            return false;
        };

        match entry.state {
            TaskState::Pending => {
                entry.cancel.store(true, Ordering::SeqCst);
                entry.state = TaskState::Revoked;
                info!("Revoked pending task {}", task_id);
                true
            }
            TaskState::Started => {
                entry.cancel.store(true, Ordering::SeqCst);
                info!("Cancellation requested for running task {}", task_id);
                true
            }
            _ => false,
        }
    }

    fn forget(&self, task_id: &str) {
        let mut tasks = write_table(&self.tasks);
        if tasks.get(task_id).is_some_and(|entry| entry.state.is_terminal()) {
            tasks.remove(task_id);
            debug!("Forgot task {}", task_id);
        }
    }
}

/// Flips the task to `Started` once the pipeline begins.
struct StartedReporter {
    task_id: String,
    tasks: TaskTable,
}

impl ProgressReporter for StartedReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total_steps } => {
                debug!("Task {} started with {} steps", self.task_id, total_steps);
                set_state(&self.tasks, &self.task_id, TaskState::Started);
            }
            ProgressEvent::StepFinished(outcome) if !outcome.is_applied() => {
                debug!(
                    "Task {} step {} ({}): {}",
                    self.task_id, outcome.index, outcome.operation, outcome.status
                );
            }
            _ => {}
        }
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<(String, PipelineTask)>,
    shutdown: Arc<AtomicBool>,
    executor: Arc<TaskExecutor>,
    tasks: TaskTable,
    timeout: Option<Duration>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok((task_id, task)) => {
                let cancel = {
                    let table = read_table(&tasks);
                    match table.get(&task_id) {
                        Some(entry) if matches!(entry.state, TaskState::Pending) => {
                            Arc::clone(&entry.cancel)
                        }
                        _ => {
                            debug!("Worker {} skipping revoked task {}", worker_id, task_id);
                            continue;
                        }
                    }
                };

                debug!("Worker {} processing task {}", worker_id, task_id);

                let mut control = RunControl::new().with_cancel_flag(cancel);
                if let Some(limit) = timeout {
                    control = control.with_timeout(limit);
                }
                let progress = StartedReporter {
                    task_id: task_id.clone(),
                    tasks: Arc::clone(&tasks),
                };

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(&task, &control, &progress)
                }));

                let state = match outcome {
                    Ok(Ok(output)) => TaskState::Succeeded(output),
                    Ok(Err(e)) => {
                        warn!("Task {} failed: {}", task_id, e);
                        TaskState::Failed(e.to_string())
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("Worker {} panicked on task {}: {}", worker_id, task_id, message);
                        TaskState::Failed(WorkerError::Panicked(message).to_string())
                    }
                };
                set_state(&tasks, &task_id, state);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
