pub mod artifact;
pub mod workspace;

pub use artifact::{copy_artifact, remove_dir_tolerant, write_atomic};
pub use workspace::Workspace;
