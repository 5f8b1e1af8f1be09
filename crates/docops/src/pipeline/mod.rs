pub mod context;
pub mod error;
pub mod progress;
pub mod report;
pub mod runner;

pub use context::{RunControl, RunState, StateKey};
pub use error::PipelineError;
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter};
pub use report::{RunReport, StepOutcome, StepStatus};
pub use runner::Pipeline;
