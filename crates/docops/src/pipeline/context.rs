use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::PipelineError;

/// Keys of the run-scoped side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Keyword phrases found by `extract_keywords_for_bolding`.
    ExtractedKeywords,
}

/// Values shared between steps of one run. Created empty per run and
/// dropped with it.
#[derive(Debug, Default)]
pub struct RunState {
    values: HashMap<StateKey, Value>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: StateKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn insert(&mut self, key: StateKey, value: Value) {
        self.values.insert(key, value);
    }

    pub fn contains(&self, key: StateKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn extracted_keywords(&self) -> Option<Vec<String>> {
        self.get(StateKey::ExtractedKeywords)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_extracted_keywords(&mut self, keywords: Vec<String>) {
        self.insert(
            StateKey::ExtractedKeywords,
            Value::Array(keywords.into_iter().map(Value::String).collect()),
        );
    }
}

/// Cancellation flag and optional deadline, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Shares an existing flag, so a caller can cancel from another thread.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails if the run should stop before starting step `step`.
    pub fn check(&self, step: usize) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled { step });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PipelineError::TimedOut { step });
        }
        Ok(())
    }
}
