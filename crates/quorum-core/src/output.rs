//! Prediction and metrics artifacts.
//!
//! Predictions are persisted as one flat JSON array of answer strings where
//! position `i` answers inference record `i`. Epoch reports are appended to
//! a JSON Lines log, one report per line, so an interrupted run keeps every
//! epoch it completed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::metrics::EpochReport;

/// Serialization layout of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document (an array when several records are written)
    Json,
    /// One compact JSON document per line
    JsonLines,
}

/// Serializes records to an underlying writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            records: 0,
        }
    }

    /// Write one record followed by a newline.
    pub fn write<T: Serialize + ?Sized>(&mut self, record: &T) -> io::Result<()> {
        self.encode(record, self.pretty && self.format == OutputFormat::Json)?;
        self.records += 1;
        Ok(())
    }

    /// Write a sequence: a single array for JSON, one line each for JSON Lines.
    pub fn write_all<T: Serialize>(&mut self, records: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.encode(records, self.pretty)?;
                self.records += records.len();
            }
            OutputFormat::JsonLines => {
                for record in records {
                    self.write(record)?;
                }
            }
        }
        Ok(())
    }

    fn encode<T: Serialize + ?Sized>(&mut self, value: &T, pretty: bool) -> io::Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    /// Records written so far.
    pub fn records_written(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Persist predicted answers as a flat JSON array, replacing any existing file.
pub fn write_predictions(path: &Path, predictions: &[String], pretty: bool) -> Result<()> {
    create_parent(path)?;
    let mut writer = OutputWriter::new(
        BufWriter::new(File::create(path)?),
        OutputFormat::Json,
        pretty,
    );
    writer.write_all(predictions)?;
    writer.flush()?;
    tracing::info!(
        path = %path.display(),
        count = predictions.len(),
        "Predictions written"
    );
    Ok(())
}

/// Read back a predictions array.
pub fn read_predictions(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Append-only JSON Lines log of epoch reports.
pub struct MetricsLog {
    writer: OutputWriter<BufWriter<File>>,
}

impl MetricsLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        create_parent(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: OutputWriter::new(BufWriter::new(file), OutputFormat::JsonLines, false),
        })
    }

    /// Append one report and flush it to disk.
    pub fn append(&mut self, report: &EpochReport) -> Result<()> {
        self.writer.write(report)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn reports_written(&self) -> usize {
        self.writer.records_written()
    }
}

/// Read every record of a JSON Lines file, skipping blank lines.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
