pub mod last_line;


use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestorError {
    #[error("Benchmark produced no output")]
    EmptyOutput,
    #[error("Last line of output has no ': ' separator: {0:?}")]
    MissingSeparator(String),
    #[error("Last line of output has no value after the separator: {0:?}")]
    MissingValue(String),
    #[error("Failed to read {field} from {value:?} as a number")]
    InvalidNumber { field: &'static str, value: String },
}

/// container for information extracted from running a benchmark
/// supposed to be interpreted by the benchmark's output parser
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub runtime: Duration,
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}
