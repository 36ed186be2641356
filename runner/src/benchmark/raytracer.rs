use super::{nb_threads, Benchmark, BenchmarkError};
use crate::{
    ingest::last_line::last_line_number,
    values::{RunResult, RunVariables},
};

/// Ray tracer rendering a preset scene, reports its render time as
/// `Duration: <seconds> s` on the last line
#[derive(Debug, Clone, Copy)]
pub struct RayTracer;

impl Benchmark for RayTracer {
    fn get_run_var_names(&self) -> &'static [&'static str] {
        &["nb_threads", "preset"]
    }

    fn single_run_command(&self, variables: &RunVariables) -> Result<Vec<String>, BenchmarkError> {
        let preset = variables
            .get("preset")
            .ok_or(BenchmarkError::MissingVariable("preset"))?;

        Ok(vec![
            "./raytracer".to_owned(),
            format!("--threads {}", nb_threads(variables)),
            format!("--preset {preset}"),
        ])
    }

    fn parse_output_to_results(
        &self,
        command_output: &str,
        variables: &RunVariables,
    ) -> Result<RunResult, BenchmarkError> {
        let duration = last_line_number(command_output, "duration")?;

        Ok(RunResult::from([
            ("nb_threads".to_owned(), nb_threads(variables)),
            ("duration".to_owned(), duration),
        ]))
    }
}
