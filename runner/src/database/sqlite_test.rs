use super::{ConnectionAdapters, RunRecord};
use crate::{
    benchmark::Benchmarks,
    config::{ConnectionConfig, SuiteConfig},
    values::{RunResult, RunVariables, Value},
};
use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};
use std::{collections::BTreeMap, time::Duration};

fn record(rep: usize, duration: f64) -> RunRecord {
    RunRecord {
        campaign: "Raytracer benchmark".to_owned(),
        benchmark: Benchmarks::RayTracer,
        rep,
        constants: BTreeMap::from([("compiler".to_owned(), Value::from("gcc"))]),
        variables: RunVariables::from([("nb_threads".to_owned(), Value::Int(16))]),
        results: RunResult::from([("duration".to_owned(), Value::Float(duration))]),
        runtime: Duration::from_nanos(42),
    }
}

#[test]
pub fn stores_campaign_runs_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raybench.db");
    let campaign = SuiteConfig::default_suite().campaigns.remove(0);

    let mut connection =
        ConnectionAdapters::load(&ConnectionConfig::SQLite { path: path.clone() }).unwrap();
    connection.init(&campaign, Some("baseline")).unwrap();
    connection.store(&record(1, 12.5)).unwrap();
    connection.store(&record(2, 13.0)).unwrap();
    connection.close().unwrap();

    let db = Connection::open(path).unwrap();

    let (name, benchmark, comment): (String, String, String) = db
        .query_row(
            "select name, benchmark, comment from campaigns",
            params![],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Raytracer benchmark");
    assert_eq!(benchmark, "raytracer");
    assert_eq!(comment, "baseline");

    let runs: i64 = db
        .query_row("select count(*) from runs where wall_time_ns = 42", params![], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(runs, 2);

    let duration: f64 = db
        .query_row(
            "select v.value from run_values v join runs r on r.id = v.run
             where r.rep = 2 and v.kind = 'result' and v.name = 'duration'",
            params![],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(duration, 13.0);

    let threads: i64 = db
        .query_row(
            "select value from run_values where kind = 'variable' and name = 'nb_threads' limit 1",
            params![],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(threads, 16);
}

#[test]
pub fn schema_is_reapplied_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::SQLite {
        path: dir.path().join("raybench.db"),
    };

    ConnectionAdapters::load(&config).unwrap().close().unwrap();
    ConnectionAdapters::load(&config).unwrap().close().unwrap();
}
