use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("No input file could be processed")]
    NothingProcessed,

    #[error("Processing task aborted: {0}")]
    TaskAborted(String),
}
