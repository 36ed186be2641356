use super::{Benchmark, BenchmarkError, Benchmarks, Counter};
use crate::{
    ingest::IngestorError,
    values::{RunVariables, Value},
};
use pretty_assertions::assert_eq;

#[test]
pub fn run_command_with_threads_and_duration() {
    let variables = RunVariables::from([
        ("nb_threads".to_owned(), Value::Int(4)),
        ("duration".to_owned(), Value::Int(3)),
    ]);

    assert_eq!(
        Counter.single_run_command(&variables).unwrap(),
        vec!["./counter", "--threads 4", "--duration 3"]
    );
}

#[test]
pub fn run_command_defaults() {
    assert_eq!(
        Counter.single_run_command(&RunVariables::new()).unwrap(),
        vec!["./counter", "--threads 2", "--duration 10"]
    );
}

#[test]
pub fn parse_throughput_from_last_line() {
    let variables = RunVariables::from([("nb_threads".to_owned(), Value::Int(8))]);
    let results = Counter
        .parse_output_to_results("threads: 8\nThroughput: 1523400.5 ops/s\n", &variables)
        .unwrap();

    assert_eq!(results["throughput"], Value::Float(1523400.5));
    assert_eq!(results["nb_threads"], Value::Int(8));
}

#[test]
pub fn non_numeric_throughput_raises() {
    let result = Counter.parse_output_to_results("Throughput: n/a ops/s", &RunVariables::new());

    assert!(matches!(
        result,
        Err(BenchmarkError::Ingest(IngestorError::InvalidNumber {
            field: "throughput",
            ..
        }))
    ));
}

#[test]
pub fn benchmark_names_from_yaml() {
    let parsed: Vec<Benchmarks> = serde_yaml::from_str("[raytracer, counter]").unwrap();

    assert_eq!(parsed, vec![Benchmarks::RayTracer, Benchmarks::Counter]);
    assert_eq!(Benchmarks::Counter.to_string(), "counter");
}
