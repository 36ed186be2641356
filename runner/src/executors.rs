mod local;


use crate::{
    config::{ConfigErrors, ExecutorConfig},
    ingest::RunOutput,
};
use std::{collections::BTreeMap, path::Path, time::Duration};
use thiserror::Error;

pub use local::LocalExecutor;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for `{command}`")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with status {status}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

// last non-empty stderr line, usually the one naming the problem
fn stderr_suffix(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| format!(": {line}"))
        .unwrap_or_default()
}

/// A place where benchmark commands are executed
pub trait Executor {
    /// run a single shell line in `current_dir`, e.g. a build script
    fn shell(&self, command: &str, current_dir: &Path) -> Result<RunOutput, ExecutorError>;

    /// run a benchmark command and capture its output
    fn run_bench_command(
        &self,
        run_command: &[String],
        environment: &BTreeMap<String, String>,
        current_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, ExecutorError>;
}

#[derive(Clone, Debug)]
pub enum Executors {
    Local(LocalExecutor),
}

impl Executors {
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        match config.name.to_lowercase().as_str() {
            "local" => Ok(Self::Local(LocalExecutor::load(config)?)),
            _ => Err(ConfigErrors::UnsupportedExecutor(config.name.clone())),
        }
    }
}

impl Executor for Executors {
    fn shell(&self, command: &str, current_dir: &Path) -> Result<RunOutput, ExecutorError> {
        match self {
            Self::Local(executor) => executor.shell(command, current_dir),
        }
    }

    fn run_bench_command(
        &self,
        run_command: &[String],
        environment: &BTreeMap<String, String>,
        current_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, ExecutorError> {
        match self {
            Self::Local(executor) => {
                executor.run_bench_command(run_command, environment, current_dir, timeout)
            }
        }
    }
}
