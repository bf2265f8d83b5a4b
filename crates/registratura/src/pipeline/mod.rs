pub mod error;
pub mod options;
pub mod runner;

pub use error::PipelineError;
pub use options::{MergeOutcome, ProcessOptions};
pub use runner::DocumentPipeline;
