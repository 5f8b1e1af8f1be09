use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::storage;

/// Removes job output directories on a dedicated thread.
pub struct JobCleaner {
    sender: Sender<PathBuf>,
    handle: JoinHandle<()>,
}

impl JobCleaner {
    pub fn start() -> Result<Self, WorkerError> {
        let (sender, receiver) = unbounded::<PathBuf>();
        let handle = thread::Builder::new()
            .name("docops-cleaner".to_string())
            .spawn(move || run_cleaner(receiver))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok(Self { sender, handle })
    }

    /// Queues `dir` for removal. Returns false when the cleaner has stopped.
    pub fn schedule(&self, dir: PathBuf) -> bool {
        match self.sender.send(dir) {
            Ok(()) => true,
            Err(e) => {
                error!("Cleaner is not running, dropping {}", e.0.display());
                false
            }
        }
    }

    /// Processes everything already queued, then stops the thread.
    pub fn stop(self) {
        drop(self.sender);
        if let Err(e) = self.handle.join() {
            error!("Cleaner thread panicked: {:?}", e);
        }
    }
}

fn run_cleaner(receiver: Receiver<PathBuf>) {
    debug!("Cleaner started");
    for dir in receiver {
        if storage::remove_dir_tolerant(&dir) {
            info!("Cleaned up output directory {}", dir.display());
        }
    }
    debug!("Cleaner stopped");
}
