use super::{nb_threads, Benchmark, BenchmarkError};
use crate::{
    ingest::last_line::last_line_number,
    values::{RunResult, RunVariables, Value},
};

/// Multithreaded counter hammering a shared counter for a fixed number of
/// seconds, reports `Throughput: <ops> ops/s` on the last line
#[derive(Debug, Clone, Copy)]
pub struct Counter;

impl Benchmark for Counter {
    fn get_run_var_names(&self) -> &'static [&'static str] {
        &["nb_threads", "duration"]
    }

    fn single_run_command(&self, variables: &RunVariables) -> Result<Vec<String>, BenchmarkError> {
        let duration = variables
            .get("duration")
            .cloned()
            .unwrap_or(Value::Int(10));

        Ok(vec![
            "./counter".to_owned(),
            format!("--threads {}", nb_threads(variables)),
            format!("--duration {duration}"),
        ])
    }

    fn parse_output_to_results(
        &self,
        command_output: &str,
        variables: &RunVariables,
    ) -> Result<RunResult, BenchmarkError> {
        let throughput = last_line_number(command_output, "throughput")?;

        Ok(RunResult::from([
            ("nb_threads".to_owned(), nb_threads(variables)),
            ("throughput".to_owned(), throughput),
        ]))
    }
}
