use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::models::{Observation, Series};
use crate::{AppError, Result};

pub const HEADER: [&str; 2] = ["date", "price"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Durable, append-only record of observations.
#[cfg_attr(test, mockall::automock)]
pub trait HistoryStore: Send + Sync {
    fn append(&self, observation: &Observation) -> Result<()>;
    fn load(&self) -> Result<Series>;
}

/// `date,price` CSV file. Rows are only ever appended.
#[derive(Debug, Clone)]
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, action: &str, err: impl std::fmt::Display) -> AppError {
        AppError::Persistence(format!("{} {}: {}", action, self.path.display(), err))
    }

    fn ends_with_newline(&self, file: &mut fs::File) -> Result<bool> {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| self.persistence_error("inspect", e))?;
        Ok(last[0] == b'\n')
    }

    fn encode(&self, observation: &Observation, with_header: bool) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if with_header {
            writer
                .write_record(HEADER)
                .map_err(|e| self.persistence_error("encode header for", e))?;
        }
        writer
            .write_record([
                observation.date.format(DATE_FORMAT).to_string(),
                observation.price.to_string(),
            ])
            .map_err(|e| self.persistence_error("encode row for", e))?;

        writer
            .into_inner()
            .map_err(|e| self.persistence_error("encode row for", e))
    }
}

/// `None` for header rows and anything that is not a valid observation.
fn parse_row(record: &csv::StringRecord) -> std::result::Result<Option<Observation>, String> {
    if record.len() != 2 {
        return Err(format!("expected 2 fields, found {}", record.len()));
    }

    let (date, price) = (record[0].trim(), record[1].trim());
    if date.eq_ignore_ascii_case(HEADER[0]) && price.eq_ignore_ascii_case(HEADER[1]) {
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| format!("bad date '{}': {}", date, e))?;
    let price = Decimal::from_str(price).map_err(|e| format!("bad price '{}': {}", price, e))?;
    if price <= Decimal::ZERO {
        return Err(format!("non-positive price {}", price));
    }

    Ok(Some(Observation::new(date, price)))
}

impl HistoryStore for CsvHistoryStore {
    fn append(&self, observation: &Observation) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| self.persistence_error("create directory for", e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.persistence_error("open", e))?;

        let len = file
            .metadata()
            .map_err(|e| self.persistence_error("stat", e))?
            .len();

        // A previous write that stopped mid-row must not swallow this one.
        let mut bytes = Vec::new();
        if len > 0 && !self.ends_with_newline(&mut file)? {
            warn!(path = %self.path.display(), "History file ends mid-row, starting a new line");
            bytes.push(b'\n');
        }
        bytes.extend(self.encode(observation, len == 0)?);

        // One write per append keeps concurrent runs interleaving whole rows.
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .map_err(|e| self.persistence_error("append to", e))?;

        debug!(path = %self.path.display(), date = %observation.date, price = %observation.price, "Appended observation");
        Ok(())
    }

    fn load(&self) -> Result<Series> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Series::new()),
            Err(e) => return Err(self.persistence_error("open", e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut series = Series::new();
        for (line, record) in reader.records().enumerate() {
            let line = line + 1;
            match record {
                Ok(record) => match parse_row(&record) {
                    Ok(Some(observation)) => series.push(observation),
                    Ok(None) => {}
                    Err(reason) => warn!(path = %self.path.display(), line, %reason, "Skipping malformed history row"),
                },
                Err(e) => warn!(path = %self.path.display(), line, error = %e, "Skipping unreadable history row"),
            }
        }

        Ok(series)
    }
}
