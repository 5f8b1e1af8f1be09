pub mod pool;
pub mod queue;
pub mod task;

pub use pool::WorkerPool;
pub use queue::{TaskQueue, TaskState};
pub use task::{PipelineTask, TaskExecutor, TaskOutput};
