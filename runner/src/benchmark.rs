mod counter;
mod raytracer;

#[cfg(test)]
mod counter_test;

use crate::{
    ingest::IngestorError,
    values::{RunResult, RunVariables, Value},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use counter::Counter;
pub use raytracer::RayTracer;

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Run variable {0} is required but was not set")]
    MissingVariable(&'static str),
    #[error("Failed to parse benchmark output")]
    Ingest(#[from] IngestorError),
}

/// A system package the benchmark needs in order to build or run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDependency {
    /// package name as known to the distribution
    pub package: &'static str,
    /// executable whose presence on PATH shows the package is installed
    pub provides: &'static str,
}

impl PackageDependency {
    pub const fn new(package: &'static str, provides: &'static str) -> Self {
        Self { package, provides }
    }

    pub fn is_installed(&self) -> bool {
        which::which(self.provides).is_ok()
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (provides `{}`)", self.package, self.provides)
    }
}

/// The template operations a campaign calls for each benchmark.
///
/// Run commands are lists of shell words; a single word may carry a flag
/// together with its value (`"--threads 8"`), the executor joins them with
/// spaces and hands the line to `sh -c`.
pub trait Benchmark {
    fn get_run_var_names(&self) -> &'static [&'static str];

    fn dependencies(&self) -> Vec<PackageDependency> {
        vec![
            PackageDependency::new("build-essential", "make"),
            PackageDependency::new("cmake", "cmake"),
        ]
    }

    /// shell command that builds the binary inside the source directory
    fn build_command(&self) -> &'static str {
        "./build.sh"
    }

    fn single_run_command(&self, variables: &RunVariables) -> Result<Vec<String>, BenchmarkError>;

    fn parse_output_to_results(
        &self,
        command_output: &str,
        variables: &RunVariables,
    ) -> Result<RunResult, BenchmarkError>;
}

/// All supported benchmarks, selected by name in the campaign config
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Benchmarks {
    RayTracer,
    Counter,
}

impl Benchmarks {
    fn inner(&self) -> &dyn Benchmark {
        match self {
            Self::RayTracer => &RayTracer,
            Self::Counter => &Counter,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RayTracer => "raytracer",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for Benchmarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Benchmark for Benchmarks {
    fn get_run_var_names(&self) -> &'static [&'static str] {
        self.inner().get_run_var_names()
    }

    fn dependencies(&self) -> Vec<PackageDependency> {
        self.inner().dependencies()
    }

    fn build_command(&self) -> &'static str {
        self.inner().build_command()
    }

    fn single_run_command(&self, variables: &RunVariables) -> Result<Vec<String>, BenchmarkError> {
        self.inner().single_run_command(variables)
    }

    fn parse_output_to_results(
        &self,
        command_output: &str,
        variables: &RunVariables,
    ) -> Result<RunResult, BenchmarkError> {
        self.inner()
            .parse_output_to_results(command_output, variables)
    }
}

/// thread count of a run, 2 when the campaign does not sweep it
pub(crate) fn nb_threads(variables: &RunVariables) -> Value {
    variables
        .get("nb_threads")
        .cloned()
        .unwrap_or(Value::Int(2))
}
