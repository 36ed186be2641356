
use crate::{
    benchmark::{Benchmark, BenchmarkError},
    config::{CampaignConfig, ConfigErrors, ConnectionConfig, ExecutorConfig, SuiteConfig},
    database::{ConnectionAdapters, ConnectionError, RunRecord},
    executors::{Executor, ExecutorError, Executors},
    values::RunVariables,
};
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigErrors),
    #[error("Failed to execute benchmark")]
    Executor(#[from] ExecutorError),
    #[error("Benchmark failed")]
    Benchmark(#[from] BenchmarkError),
    #[error("Failed to store results")]
    Storage(#[from] ConnectionError),
}

/// A configured sweep of one benchmark: build once, then every variable combination
/// `nb_runs` times
#[derive(Debug, Clone)]
pub struct Campaign {
    config: CampaignConfig,
}

impl Campaign {
    pub fn new(config: CampaignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// run the whole campaign, returns the number of stored records
    #[instrument(skip_all, fields(campaign = %self.config.name), level = "info")]
    pub fn run<E: Executor>(
        &self,
        executor: &E,
        storage: &mut ConnectionAdapters,
        comment: Option<&str>,
    ) -> Result<usize, CampaignError> {
        let config = &self.config;
        let benchmark = config.benchmark;

        info!("Building {benchmark} in {:?}", config.src_dir);
        executor.shell(config.build_command(), &config.src_dir)?;

        storage.init(config, comment)?;

        let runs = config.runs();
        let total = runs.len() * config.nb_runs;
        let mut processed = 0;

        for variables in runs {
            let merged = config.with_constants(&variables);
            let run_command = benchmark.single_run_command(&merged)?;

            for rep in 1..=config.nb_runs {
                debug!(rep = rep, "Running `{}`", run_command.iter().join(" "));

                let output = executor.run_bench_command(
                    &run_command,
                    &config.environment,
                    &config.src_dir,
                    config.timeout(),
                )?;

                let results = benchmark.parse_output_to_results(&output.stdout, &merged)?;
                debug!(results = ?results, "Parsed run output");

                storage.store(&RunRecord {
                    campaign: config.name.clone(),
                    benchmark,
                    rep,
                    constants: config.constants.clone(),
                    variables: variables.clone(),
                    results,
                    runtime: output.runtime,
                })?;

                processed += 1;
                info!("Done with {processed}/{total}");
            }
        }

        if let Some(clean_command) = config.clean_command.as_deref() {
            info!("Cleaning {benchmark}");
            executor.shell(clean_command, &config.src_dir)?;
        }

        Ok(processed)
    }
}

/// A list of campaigns executed one after another with a shared executor and result store
#[derive(Debug)]
pub struct CampaignSuite {
    campaigns: Vec<Campaign>,
    executor: ExecutorConfig,
    database: ConnectionConfig,
}

impl CampaignSuite {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            campaigns: config.campaigns.into_iter().map(Campaign::new).collect(),
            executor: config.executor,
            database: config.database,
        }
    }

    /// log the number of runs and, where it can be known upfront, the expected duration
    pub fn print_durations(&self) {
        let mut total_seconds = Some(0.0);

        for campaign in self.campaigns.iter() {
            let config = campaign.config();

            match config.expected_duration() {
                Some(seconds) => info!(
                    "Campaign {}: {} runs, expected duration {seconds:.0}s",
                    config.name,
                    config.total_runs()
                ),
                None => info!(
                    "Campaign {}: {} runs, expected duration unknown",
                    config.name,
                    config.total_runs()
                ),
            }

            total_seconds = total_seconds.zip(config.expected_duration()).map(|(a, b)| a + b);
        }

        if let Some(seconds) = total_seconds {
            info!("Expected duration of the suite: {seconds:.0}s");
        }
    }

    /// log every command the suite would execute, without running anything
    pub fn print_plan(&self) -> Result<(), CampaignError> {
        for campaign in self.campaigns.iter() {
            let config = campaign.config();
            info!(
                "Campaign {}: build `{}` in {:?}",
                config.name,
                config.build_command(),
                config.src_dir
            );

            for variables in config.runs() {
                let command = config
                    .benchmark
                    .single_run_command(&config.with_constants(&variables))?;
                info!(
                    "  {} x `{}` ({})",
                    config.nb_runs,
                    command.iter().join(" "),
                    describe(&variables)
                );
            }
        }

        Ok(())
    }

    pub fn run_suite(self, comment: Option<&str>) -> Result<(), CampaignError> {
        let executor = Executors::load(&self.executor)?;
        let mut storage = ConnectionAdapters::load(&self.database)?;
        let mut stored = 0;

        for campaign in self.campaigns.iter() {
            stored += campaign.run(&executor, &mut storage, comment)?;
        }

        info!("Done with processing, stored {stored} results");

        Ok(storage.close()?)
    }
}

fn describe(variables: &RunVariables) -> String {
    variables
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .join(", ")
}
