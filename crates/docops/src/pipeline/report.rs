use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    /// No transform is registered for the operation type.
    NotPerformed,
    Failed {
        reason: String,
    },
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::NotPerformed => f.write_str("not performed"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// What happened to one operation of the list (1-based `index`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub operation: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        self.status == StepStatus::Applied
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub final_path: PathBuf,
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// True when at least one step was skipped or failed.
    pub fn is_degraded(&self) -> bool {
        self.steps.iter().any(|s| !s.is_applied())
    }

    pub fn applied_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_applied()).count()
    }

    pub fn problems(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.is_applied())
    }

    /// One-line summary, e.g. `3 of 4 steps applied`.
    pub fn summary(&self) -> String {
        format!("{} of {} steps applied", self.applied_count(), self.steps.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, status: StepStatus) -> StepOutcome {
        StepOutcome {
            index,
            operation: format!("op{}", index),
            status,
        }
    }

    #[test]
    fn test_report_degraded() {
        let mut report = RunReport {
            final_path: PathBuf::from("out.docx"),
            steps: vec![outcome(1, StepStatus::Applied)],
        };
        assert!(!report.is_degraded());

        report.steps.push(outcome(2, StepStatus::NotPerformed));
        assert!(report.is_degraded());
        assert_eq!(report.summary(), "1 of 2 steps applied");
        assert_eq!(report.problems().count(), 1);
    }

    #[test]
    fn test_step_outcome_serializes_flat() {
        let value = serde_json::to_value(outcome(
            3,
            StepStatus::Failed {
                reason: "boom".into(),
            },
        ))
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"index": 3, "operation": "op3", "status": "failed", "reason": "boom"})
        );
    }
}
