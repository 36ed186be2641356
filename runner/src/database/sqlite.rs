use super::{hostname, ConnectionError, RunRecord};
use crate::{config::CampaignConfig, values::Value};
use rusqlite::{
    params,
    types::{ToSql, ToSqlOutput, ValueRef},
    Connection,
};
use std::path::Path;
use tracing::{debug, error, info};

/// SQLite storage, one row per campaign and run plus a long table of run values
#[derive(Debug)]
pub struct InnerConnection {
    connection: Connection,
    campaign: Option<i64>,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Int(value) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*value)),
            Value::Float(value) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*value)),
            Value::Str(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

impl InnerConnection {
    pub fn load(path: &Path) -> Result<Self, ConnectionError> {
        let connection = Connection::open(path)?;

        let mut counter = 1;
        for table in SQL_SCHEMA {
            match connection.execute(table, []) {
                Ok(_) => debug!("Applied SQL schema ({counter}/{SQL_SCHEMA_NUMBER})"),
                Err(error) => {
                    error!(error = ?error, table = table, "Failed to apply SQL schema ({counter}/{SQL_SCHEMA_NUMBER}): {error}");

                    return Err(ConnectionError::SQLite(error));
                }
            };

            counter += 1;
        }

        info!(path = ?path, "Opened SQLite result database");

        Ok(Self {
            connection,
            campaign: None,
        })
    }

    pub fn init(
        &mut self,
        campaign: &CampaignConfig,
        comment: Option<&str>,
    ) -> Result<(), ConnectionError> {
        self.connection
            .prepare_cached(
                "insert into campaigns
                 (name, benchmark, host, comment, started)
                 values (?, ?, ?, ?, ?)",
            )?
            .execute(params![
                campaign.name,
                campaign.benchmark.to_string(),
                hostname().to_string_lossy().into_owned(),
                comment.unwrap_or(""),
                chrono::Local::now().to_rfc3339(),
            ])?;

        let id = self.connection.last_insert_rowid();
        info!(name = %campaign.name, id = id, "Created campaign entry");
        self.campaign = Some(id);

        Ok(())
    }

    pub fn store(&self, record: &RunRecord) -> Result<(), ConnectionError> {
        let campaign = self.campaign.ok_or(ConnectionError::NoCampaign)?;

        // NOTE: We can guarantee that no nested transactions are present due to only having one
        // connection at a time.
        let mut tx = self.connection.unchecked_transaction()?;
        tx.set_drop_behavior(rusqlite::DropBehavior::Rollback);

        tx.prepare_cached(
            "insert into runs
             (campaign, rep, wall_time_ns)
             values (?, ?, ?)",
        )?
        .execute(params![
            campaign,
            record.rep as i64,
            i64::try_from(record.runtime.as_nanos()).unwrap_or(i64::MAX)
        ])?;
        let run = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare_cached(
                "insert into run_values
                 (run, kind, name, value)
                 values (?, ?, ?, ?)",
            )?;

            for (kind, values) in [
                ("constant", &record.constants),
                ("variable", &record.variables),
                ("result", &record.results),
            ] {
                for (name, value) in values {
                    insert.execute(params![run, kind, name, value])?;
                }
            }
        }

        tx.commit()?;
        debug!(id = run, "Inserted run");

        Ok(())
    }

    pub fn close(mut self) -> Result<(), ConnectionError> {
        let mut counter = 0;
        while let Err((connection, error)) = self.connection.close() {
            counter += 1;
            self.connection = connection;
            error!(error = ?error, "Failed to close SQLite connection: {error}, trying again {counter}/3");

            if counter == 3 {
                error!("Failed to close connection, giving up");

                return Err(ConnectionError::SQLite(error));
            }
        }

        info!("Closed SQLite connection");

        Ok(())
    }
}

pub const SQL_SCHEMA: [&str; 3] = [
    "create table if not exists campaigns (
    id integer primary key,
    name text not null,
    benchmark text not null,
    host text not null,
    comment text not null,
    started text not null
);",
    "create table if not exists runs (
    id integer primary key,
    campaign integer not null references campaigns (id),
    rep integer not null,
    wall_time_ns integer not null
);",
    "create table if not exists run_values (
    run integer not null references runs (id),
    kind text not null,
    name text not null,
    value,
    primary key (run, kind, name)
);",
];
pub const SQL_SCHEMA_NUMBER: usize = SQL_SCHEMA.len();
