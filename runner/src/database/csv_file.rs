use super::{hostname, ConnectionError, RunRecord};
use crate::config::CampaignConfig;
use csv::Writer;
use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Writes one csv file per campaign into `<dir>/<hostname>/`
#[derive(Debug)]
pub struct CsvConnection {
    dir: PathBuf,
    current: Option<CampaignFile>,
}

#[derive(Debug)]
struct CampaignFile {
    path: PathBuf,
    writer: Writer<File>,
    // column names, written with the first record
    header: Option<Vec<String>>,
    records: usize,
}

impl CsvConnection {
    pub fn load(dir: &Path) -> Result<Self, ConnectionError> {
        let dir = dir.join(hostname());
        fs::create_dir_all(&dir)?;

        Ok(Self { dir, current: None })
    }

    pub fn init(&mut self, campaign: &CampaignConfig) -> Result<(), ConnectionError> {
        self.finish()?;

        let stem = format!(
            "{}_{}",
            file_stem(&campaign.name),
            chrono::Local::now().format("%Y%m%d_%H%M%S%.3f")
        );
        let (path, file) = create_unique(&self.dir, &stem)?;
        info!(path = ?path, "Writing results of {} to csv", campaign.name);

        self.current = Some(CampaignFile {
            writer: Writer::from_writer(file),
            path,
            header: None,
            records: 0,
        });

        Ok(())
    }

    pub fn store(&mut self, record: &RunRecord) -> Result<(), ConnectionError> {
        let file = self.current.as_mut().ok_or(ConnectionError::NoCampaign)?;
        let fields = record.fields();

        if file.header.is_none() {
            let header: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
            file.writer.write_record(&header)?;
            file.header = Some(header);
        }
        let header = file.header.as_deref().unwrap_or_default();

        for (name, _) in fields.iter() {
            if !header.contains(name) {
                warn!(
                    column = %name,
                    "Column not present in the csv header of {}, dropping it",
                    record.campaign
                );
            }
        }

        // align to the header, missing columns stay empty
        file.writer.write_record(header.iter().map(|column| {
            fields
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value.as_str())
                .unwrap_or("")
        }))?;
        // flush per run so an aborted campaign keeps what it measured
        file.writer.flush()?;
        file.records += 1;

        debug!(rep = record.rep, "Stored record in {:?}", file.path);

        Ok(())
    }

    fn finish(&mut self) -> Result<(), ConnectionError> {
        if let Some(mut file) = self.current.take() {
            file.writer.flush()?;
            info!(path = ?file.path, "Stored {} records", file.records);
        }

        Ok(())
    }

    pub fn close(mut self) -> Result<(), ConnectionError> {
        self.finish()
    }
}

/// never overwrite earlier results, a clash gets a numbered suffix
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File), ConnectionError> {
    let mut attempt = 0;
    loop {
        let path = match attempt {
            0 => dir.join(format!("{stem}.csv")),
            n => dir.join(format!("{stem}_{n}.csv")),
        };

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// campaign names are free text, keep file names to a safe subset
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
