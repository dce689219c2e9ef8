//! Row sources and report sinks.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::dataset::DropCounts;
use crate::error::{Error, Result};
use crate::reconcile::{Coverage, ScoredRow, TagUsage};
use crate::row::Row;

pub trait RowSource {
    fn read_rows(&mut self) -> Result<Vec<Row>>;
}

/// A JSON array of rows read from a file.
pub struct JsonRowSource {
    path: PathBuf,
}

impl JsonRowSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowSource for JsonRowSource {
    fn read_rows(&mut self) -> Result<Vec<Row>> {
        let data = fs::read_to_string(&self.path)
            .map_err(|e| Error::Config(format!("cannot read rows from {}: {}", self.path.display(), e)))?;
        let rows: Vec<Row> = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("malformed rows in {}: {}", self.path.display(), e)))?;
        tracing::info!(path = %self.path.display(), rows = rows.len(), "rows loaded");
        Ok(rows)
    }
}

/// Rows already in memory.
impl RowSource for Vec<Row> {
    fn read_rows(&mut self) -> Result<Vec<Row>> {
        Ok(std::mem::take(self))
    }
}

pub trait ReportSink {
    fn record_predictions(&mut self, rows: &[ScoredRow]) -> Result<()>;
    fn record_usage(&mut self, usage: &TagUsage) -> Result<()>;
    fn record_coverage(&mut self, coverage: &Coverage) -> Result<()>;
    fn record_dropped(&mut self, _dropped: &DropCounts) -> Result<()> {
        Ok(())
    }
    /// Called once after everything is recorded.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
struct Report {
    predictions: Value,
    usage: Value,
    coverage: Value,
    dropped: Value,
}

/// Collects every section and writes one pretty JSON document on `finish`.
pub struct JsonReportSink<W: Write> {
    out: W,
    report: Report,
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            report: Report::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonReportSink<fs::File> {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(fs::File::create(&path)?))
    }
}

impl<W: Write> ReportSink for JsonReportSink<W> {
    fn record_predictions(&mut self, rows: &[ScoredRow]) -> Result<()> {
        self.report.predictions = serde_json::to_value(rows)?;
        Ok(())
    }

    fn record_usage(&mut self, usage: &TagUsage) -> Result<()> {
        self.report.usage = serde_json::to_value(usage)?;
        Ok(())
    }

    fn record_coverage(&mut self, coverage: &Coverage) -> Result<()> {
        self.report.coverage = serde_json::to_value(coverage)?;
        Ok(())
    }

    fn record_dropped(&mut self, dropped: &DropCounts) -> Result<()> {
        self.report.dropped = serde_json::to_value(dropped)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, &self.report)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Write enriched rows back out, evidence included.
pub fn write_rows(path: impl Into<PathBuf>, rows: &[Row]) -> Result<()> {
    let path = path.into();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(rows)?)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "enriched rows written");
    Ok(())
}
