pub mod csv_file;
#[cfg(feature = "rusqlite")]
pub mod sqlite;

#[cfg(all(test, feature = "rusqlite"))]
mod sqlite_test;

use crate::{
    benchmark::Benchmarks,
    config::{CampaignConfig, ConnectionConfig},
    values::{RunResult, RunVariables, Value},
};
use std::{collections::BTreeMap, ffi::OsString, time::Duration};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to prepare the data directory")]
    Io(#[from] std::io::Error),
    #[error("Failed to write csv record")]
    Csv(#[from] csv::Error),
    #[cfg(feature = "rusqlite")]
    #[error("SQLite error")]
    SQLite(#[from] rusqlite::Error),
    #[error("No campaign was started before storing a record")]
    NoCampaign,
}

/// Everything that is kept about a single benchmark run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub campaign: String,
    pub benchmark: Benchmarks,
    /// 1-based repetition of this variable combination
    pub rep: usize,
    pub constants: BTreeMap<String, Value>,
    pub variables: RunVariables,
    pub results: RunResult,
    pub runtime: Duration,
}

impl RunRecord {
    /// Flat column view of the record.
    ///
    /// Results shadow variables and constants of the same name in place, so `nb_threads`
    /// shows up once.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("campaign".to_owned(), self.campaign.clone()),
            ("benchmark".to_owned(), self.benchmark.to_string()),
            ("rep".to_owned(), self.rep.to_string()),
        ];

        for (name, value) in self
            .constants
            .iter()
            .chain(self.variables.iter())
            .chain(self.results.iter())
        {
            match fields.iter_mut().find(|(field, _)| field == name) {
                Some(field) => field.1 = value.to_string(),
                None => fields.push((name.clone(), value.to_string())),
            }
        }

        fields.push((
            "wall_time_ns".to_owned(),
            self.runtime.as_nanos().to_string(),
        ));

        fields
    }
}

/// Storage backends for run records
#[derive(Debug)]
pub enum ConnectionAdapters {
    Csv(csv_file::CsvConnection),
    #[cfg(feature = "rusqlite")]
    SQLite(sqlite::InnerConnection),
}

impl ConnectionAdapters {
    pub fn load(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        match config {
            ConnectionConfig::Csv { dir } => Ok(Self::Csv(csv_file::CsvConnection::load(dir)?)),
            #[cfg(feature = "rusqlite")]
            ConnectionConfig::SQLite { path } => {
                Ok(Self::SQLite(sqlite::InnerConnection::load(path)?))
            }
        }
    }

    /// start storing records for `campaign`, finishes any previous campaign
    #[cfg_attr(not(feature = "rusqlite"), allow(unused_variables))]
    pub fn init(
        &mut self,
        campaign: &CampaignConfig,
        comment: Option<&str>,
    ) -> Result<(), ConnectionError> {
        match self {
            Self::Csv(connection) => connection.init(campaign),
            #[cfg(feature = "rusqlite")]
            Self::SQLite(connection) => connection.init(campaign, comment),
        }
        .map_err(|error| {
            error!(error = ?error, campaign = %campaign.name, "Failed to initialize storage for campaign");
            error
        })
    }

    pub fn store(&mut self, record: &RunRecord) -> Result<(), ConnectionError> {
        match self {
            Self::Csv(connection) => connection.store(record),
            #[cfg(feature = "rusqlite")]
            Self::SQLite(connection) => connection.store(record),
        }
    }

    pub fn close(self) -> Result<(), ConnectionError> {
        match self {
            Self::Csv(connection) => connection.close(),
            #[cfg(feature = "rusqlite")]
            Self::SQLite(connection) => connection.close(),
        }
    }
}

/// name of this machine, results of different hosts are kept apart
pub fn hostname() -> OsString {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname,
        Err(error) => {
            error!(error = ?error, "Failed to retrieve hostname, using `localhost`: {error}");
            OsString::from("localhost")
        }
    }
}
