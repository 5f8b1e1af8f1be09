use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocopsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Job error: {0}")]
    Job(#[from] crate::jobs::JobError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Invalid operation list: {message}")]
    Format { message: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Failure reported by a single transform. Never fatal to a pipeline run.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid parameters for '{operation}': {reason}")]
    InvalidParams { operation: String, reason: String },

    #[error("Operation '{0}' is not implemented for this document type")]
    NotImplemented(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Malformed PDF: {0}")]
    PdfStructure(String),

    #[error("Failed to process DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("Failed to process DOCX: {0}")]
    Docx(String),

    #[error("XML error in '{part}': {reason}")]
    Xml { part: String, reason: String },

    #[error("Failed to write output: {0}")]
    Storage(#[from] StorageError),
}

impl TransformError {
    pub fn invalid_params(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy file from '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create workspace in '{root}': {source}")]
    CreateWorkspace {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Task failed: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Task storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker panicked while running task: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, DocopsError>;
