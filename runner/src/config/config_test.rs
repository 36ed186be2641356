use super::{check_executable, CampaignConfig, ConfigErrors, ConnectionConfig, SuiteConfig};
use crate::{
    benchmark::Benchmarks,
    values::{RunVariables, Value},
};
use pretty_assertions::assert_eq;
use std::{fs, os::unix::fs::PermissionsExt, path::Path, path::PathBuf};

const SUITE: &str = r#"
executor:
  name: Local
database:
  type: csv
  dir: out
campaigns:
  - name: raytracer
    benchmark: raytracer
    src_dir: SRC
    nb_runs: 5
    variables:
      nb_threads: [8, 16]
      preset: [fast_cornell_benchmark]
  - name: counter
    benchmark: counter
    src_dir: SRC
    build_command: make counter
    timeout: 30
    variables:
      nb_threads: [1, 2, 4]
      duration: [2, 3]
    constants:
      compiler: gcc
    environment:
      OMP_PROC_BIND: "true"
"#;

fn write_build_script(dir: &Path, mode: u32) {
    let script = dir.join("build.sh");
    fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(mode)).unwrap();
}

fn suite(src_dir: &Path) -> SuiteConfig {
    serde_yaml::from_str(&SUITE.replace("SRC", src_dir.to_str().unwrap())).unwrap()
}

fn raytracer(src_dir: &Path) -> CampaignConfig {
    suite(src_dir).campaigns.remove(0)
}

#[test]
pub fn load_suite_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(&path, SUITE.replace("SRC", "/tmp")).unwrap();

    let config = SuiteConfig::load(&path).unwrap();

    assert_eq!(
        config.database,
        ConnectionConfig::Csv {
            dir: PathBuf::from("out")
        }
    );
    assert_eq!(config.campaigns.len(), 2);

    let counter = &config.campaigns[1];
    assert_eq!(counter.benchmark, Benchmarks::Counter);
    assert_eq!(counter.build_command(), "make counter");
    assert_eq!(counter.nb_runs, 1);
    assert_eq!(counter.timeout().unwrap().as_secs(), 30);
    assert_eq!(counter.constants["compiler"], Value::from("gcc"));
    assert_eq!(counter.environment["OMP_PROC_BIND"], "true");
}

#[test]
pub fn missing_config_file() {
    assert!(matches!(
        SuiteConfig::load(Path::new("/nonexistent/suite.yaml")),
        Err(ConfigErrors::ReadConfig { .. })
    ));
}

#[test]
pub fn unknown_fields_are_rejected() {
    let result = serde_yaml::from_str::<SuiteConfig>(
        "campaigns:\n  - name: a\n    benchmark: raytracer\n    src_dir: .\n    nb_run: 3\n",
    );

    assert!(result.is_err());
}

#[test]
pub fn defaults_for_executor_and_database() {
    let config: SuiteConfig = serde_yaml::from_str(
        "campaigns:\n  - name: a\n    benchmark: counter\n    src_dir: .\n",
    )
    .unwrap();

    assert_eq!(config.executor.name, "local");
    assert_eq!(config.database, ConnectionConfig::default());
    assert_eq!(config.campaigns[0].build_command(), "./build.sh");
    assert!(config.campaigns[0].timeout().is_none());
}

#[cfg(feature = "rusqlite")]
#[test]
pub fn sqlite_database_with_default_path() {
    let config: SuiteConfig = serde_yaml::from_str(
        "db:\n  type: sqlite\ncampaigns:\n  - name: a\n    benchmark: counter\n    src_dir: .\n",
    )
    .unwrap();

    assert_eq!(
        config.database,
        ConnectionConfig::SQLite {
            path: PathBuf::from("raybench.db")
        }
    );
}

#[test]
pub fn cartesian_product_of_variables() {
    let runs = raytracer(Path::new("/tmp")).runs();

    assert_eq!(
        runs,
        vec![
            RunVariables::from([
                ("nb_threads".to_owned(), Value::Int(8)),
                ("preset".to_owned(), Value::from("fast_cornell_benchmark")),
            ]),
            RunVariables::from([
                ("nb_threads".to_owned(), Value::Int(16)),
                ("preset".to_owned(), Value::from("fast_cornell_benchmark")),
            ]),
        ]
    );
}

#[test]
pub fn last_variable_changes_fastest() {
    let counter = suite(Path::new("/tmp")).campaigns.remove(1);
    let order = counter
        .runs()
        .iter()
        .map(|run| (run["duration"].to_string(), run["nb_threads"].to_string()))
        .collect::<Vec<_>>();

    assert_eq!(order.len(), 6);
    assert_eq!(order[0], ("2".to_owned(), "1".to_owned()));
    assert_eq!(order[1], ("2".to_owned(), "2".to_owned()));
    assert_eq!(order[3], ("3".to_owned(), "1".to_owned()));
    assert_eq!(counter.total_runs(), 6);
    assert_eq!(counter.expected_duration(), Some(15.0));
}

#[test]
pub fn no_variables_is_a_single_run() {
    let mut campaign = raytracer(Path::new("/tmp"));
    campaign.variables.clear();

    assert_eq!(campaign.runs(), vec![RunVariables::new()]);
    assert_eq!(campaign.total_runs(), 5);
    assert_eq!(campaign.expected_duration(), None);
}

#[test]
pub fn constants_are_overridden_by_variables() {
    let mut campaign = raytracer(Path::new("/tmp"));
    campaign
        .constants
        .insert("nb_threads".to_owned(), Value::Int(1));
    campaign
        .constants
        .insert("compiler".to_owned(), Value::from("clang"));

    let merged = campaign.with_constants(&campaign.runs()[0]);

    assert_eq!(merged["nb_threads"], Value::Int(8));
    assert_eq!(merged["compiler"], Value::from("clang"));
}

#[test]
pub fn default_suite_matches_raytracer_campaign() {
    let config = SuiteConfig::default_suite();
    let campaign = &config.campaigns[0];

    assert_eq!(campaign.benchmark, Benchmarks::RayTracer);
    assert_eq!(campaign.src_dir, PathBuf::from("../../"));
    assert_eq!(campaign.total_runs(), 10);
}

#[test]
pub fn preflight_accepts_valid_suite() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o755);
    let mut config = suite(dir.path());

    assert!(!config.preflight_checks());
    assert_eq!(config.executor.name, "local");
}

#[test]
pub fn preflight_rejects_non_executable_build_script() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o644);

    assert!(suite(dir.path()).preflight_checks());
}

#[test]
pub fn preflight_rejects_missing_source_dir() {
    assert!(suite(Path::new("/nonexistent/raytracer")).preflight_checks());
}

#[test]
pub fn preflight_rejects_zero_runs_and_empty_variables() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o755);

    let mut config = suite(dir.path());
    config.campaigns[0].nb_runs = 0;
    assert!(config.preflight_checks());

    let mut config = suite(dir.path());
    config.campaigns[1]
        .variables
        .insert("duration".to_owned(), Vec::new());
    assert!(config.preflight_checks());
}

#[test]
pub fn preflight_rejects_missing_preset() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o755);
    let mut config = suite(dir.path());
    config.campaigns[0].variables.remove("preset");

    assert!(config.preflight_checks());

    // a constant is as good as a swept variable
    config.campaigns[0]
        .constants
        .insert("preset".to_owned(), Value::from("cornell"));
    assert!(!config.preflight_checks());
}

#[test]
pub fn preflight_rejects_duplicate_names_and_remote_executor() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o755);

    let mut config = suite(dir.path());
    config.campaigns[1].name = "raytracer".to_owned();
    assert!(config.preflight_checks());

    let mut config = suite(dir.path());
    config.executor.name = "ssh".to_owned();
    assert!(config.preflight_checks());
}

#[test]
pub fn executable_check() {
    let dir = tempfile::tempdir().unwrap();
    write_build_script(dir.path(), 0o700);

    assert!(check_executable(&dir.path().join("build.sh")).unwrap());
    assert!(matches!(
        check_executable(&dir.path().join("missing.sh")),
        Err(ConfigErrors::FileNotFound(_))
    ));
}
