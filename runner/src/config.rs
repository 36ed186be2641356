#[cfg(test)]
mod config_test;

use crate::{
    benchmark::{Benchmark, Benchmarks, PackageDependency},
    values::{RunVariables, Value},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{error, warn};

/// scene rendered by the default ray tracer campaign
pub const PRESET_SCENE: &str = "fast_cornell_benchmark";

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file {path}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Config file is not valid")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Executor not supported: {0}")]
    UnsupportedExecutor(String),
    #[error("Executor parameter {0} is invalid")]
    InvalidExecutorParameter(&'static str),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("Preflight checks failed")]
    PreflightFailed,
    #[error("Missing packages: {0}")]
    MissingDependencies(String),
}

/// Everything a run of `raybench` needs: where to execute, where to store and what to run
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default, alias = "db")]
    pub database: ConnectionConfig,

    // campaigns are executed in the order they are listed
    pub campaigns: Vec<CampaignConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    // Name of the selected executor, see Executors::load for the selection proccess
    pub name: String,
    // parameters for the executor that apply over all campaigns
    #[serde(default)]
    pub parameter: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "local".to_owned(),
            parameter: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// one csv file per campaign below `dir`
    Csv {
        #[serde(default = "default_data_dir")]
        dir: PathBuf,
    },
    #[cfg(feature = "rusqlite")]
    SQLite {
        #[serde(default = "default_database_path")]
        path: PathBuf,
    },
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::Csv {
            dir: default_data_dir(),
        }
    }
}

/// A sweep of one benchmark over the cartesian product of its variables
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    pub name: String,
    pub benchmark: Benchmarks,
    // directory holding the benchmark sources, build and run commands are executed in it
    pub src_dir: PathBuf,
    // overrides the benchmark's own build command
    pub build_command: Option<String>,
    // executed once after the last run of the campaign
    pub clean_command: Option<String>,
    #[serde(default = "default_nb_runs")]
    pub nb_runs: usize,
    // timeout per run in seconds, no timeout when unset
    pub timeout: Option<u64>,
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<Value>>,
    // recorded with every run but not swept
    #[serde(default)]
    pub constants: BTreeMap<String, Value>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl SuiteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let file = File::open(path).map_err(|source| ConfigErrors::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_yaml::from_reader(file)?)
    }

    /// The stock ray tracer campaign: 8 and 16
    /// threads on the fast cornell box, 5 runs each
    pub fn default_suite() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            database: ConnectionConfig::default(),
            campaigns: vec![CampaignConfig {
                name: "Raytracer benchmark".to_owned(),
                benchmark: Benchmarks::RayTracer,
                src_dir: PathBuf::from("../../"),
                build_command: None,
                clean_command: None,
                nb_runs: 5,
                timeout: None,
                variables: BTreeMap::from([
                    (
                        "nb_threads".to_owned(),
                        vec![Value::Int(8), Value::Int(16)],
                    ),
                    ("preset".to_owned(), vec![Value::from(PRESET_SCENE)]),
                ]),
                constants: BTreeMap::new(),
                environment: BTreeMap::new(),
            }],
        }
    }

    /// packages required by any campaign which are not installed
    pub fn missing_dependencies(&self) -> Vec<PackageDependency> {
        self.campaigns
            .iter()
            .flat_map(|campaign| campaign.benchmark.dependencies())
            .unique()
            .filter(|dependency| !dependency.is_installed())
            .collect()
    }

    /// Check the whole config and report every problem found, returns true if any error was found
    pub fn preflight_checks(&mut self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        self.executor.name = self.executor.name.to_lowercase();
        if self.executor.name != "local" {
            error!(
                "executor.name ({}) is not supported, please use `local`",
                self.executor.name
            );
            contains_error = true;
        }

        if self.campaigns.is_empty() {
            error!("No campaign was defined, nothing to run");
            contains_error = true;
        }

        let mut names = BTreeSet::new();
        for campaign in self.campaigns.iter() {
            if !names.insert(campaign.name.as_str()) {
                error!("Campaign {} is defined more than once", campaign.name);
                contains_error = true;
            }

            contains_error |= campaign.preflight_checks();
        }

        contains_error
    }
}

impl CampaignConfig {
    pub fn build_command(&self) -> &str {
        self.build_command
            .as_deref()
            .unwrap_or_else(|| self.benchmark.build_command())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// All variable combinations, variables in name order with the last one changing fastest
    /// and values in declaration order
    pub fn runs(&self) -> Vec<RunVariables> {
        if self.variables.is_empty() {
            return vec![RunVariables::new()];
        }

        self.variables
            .iter()
            .map(|(name, values)| values.iter().map(move |value| (name.clone(), value.clone())))
            .multi_cartesian_product()
            .map(RunVariables::from_iter)
            .collect()
    }

    /// number of benchmark invocations this campaign will perform
    pub fn total_runs(&self) -> usize {
        self.runs().len() * self.nb_runs
    }

    /// expected wall time in seconds if the campaign sweeps a numeric `duration`
    pub fn expected_duration(&self) -> Option<f64> {
        if !self.variables.contains_key("duration") {
            return None;
        }

        self.runs()
            .iter()
            .map(|variables| variables.get("duration").and_then(Value::as_f64))
            .sum::<Option<f64>>()
            .map(|seconds| seconds * self.nb_runs as f64)
    }

    fn preflight_checks(&self) -> bool {
        let mut contains_error = false;
        let name = &self.name;

        if self.nb_runs == 0 {
            error!("{name}.nb_runs cannot be 0, the campaign would not run anything");
            contains_error = true;
        }

        if self.timeout == Some(0) {
            error!("{name}.timeout cannot be 0, leave it out to run without a timeout");
            contains_error = true;
        }

        if !self.src_dir.is_dir() {
            error!(
                "Failed to find {name}.src_dir. Either not a directory or not found at {}",
                self.src_dir.to_string_lossy()
            );
            contains_error = true;
        } else if let Some(script) = self
            .build_command()
            .split_whitespace()
            .next()
            .filter(|word| word.starts_with("./"))
        {
            let script = self.src_dir.join(script);

            match check_executable(&script) {
                Ok(true) => (),
                Ok(false) => {
                    error!(
                        "Build script of {name} ({}) is not executable",
                        script.to_string_lossy()
                    );
                    contains_error = true;
                }
                Err(e) => {
                    error!(
                        "Failed to determine if the build script of {name} ({}) is executable: {e}",
                        script.to_string_lossy()
                    );
                    contains_error = true;
                }
            }
        }

        let run_var_names = self.benchmark.get_run_var_names();
        for (variable, values) in self.variables.iter() {
            if values.is_empty() {
                error!("{name}.variables.{variable} is empty, the campaign would not run anything");
                contains_error = true;
            }

            if !run_var_names.contains(&variable.as_str()) {
                warn!(
                    "{name}.variables.{variable} is not used by {}, it is only recorded",
                    self.benchmark
                );
            }
        }

        for variable in run_var_names {
            if !self.variables.contains_key(*variable) && !self.constants.contains_key(*variable)
            {
                warn!("{name} does not set {variable}, falling back to the benchmark default");
            }
        }

        // every combination has to produce a command, e.g. required variables are present
        if !contains_error {
            if let Some(Err(e)) = self
                .runs()
                .iter()
                .map(|variables| self.benchmark.single_run_command(&self.with_constants(variables)))
                .find(Result::is_err)
            {
                error!("{name} cannot build its run command: {e}");
                contains_error = true;
            }
        }

        contains_error
    }

    /// constants merged below the run variables, variables win on conflicts
    pub fn with_constants(&self, variables: &RunVariables) -> RunVariables {
        let mut merged = self.constants.clone();
        merged.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

fn default_nb_runs() -> usize {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("results")
}

#[cfg(feature = "rusqlite")]
fn default_database_path() -> PathBuf {
    PathBuf::from("raybench.db")
}
