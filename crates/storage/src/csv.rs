//! CSV Session Log

use crate::{FrameSink, SinkError};
use chrono::{DateTime, Local, SecondsFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use telemetry_protocol::{Channel, Frame};
use tracing::info;

/// Default log file location for a session started at `started`
pub fn session_log_path(dir: impl AsRef<Path>, started: DateTime<Local>) -> PathBuf {
    dir.as_ref()
        .join(format!("telemetry_{}.csv", started.format("%Y%m%d_%H%M%S")))
}

/// Writes one CSV row per frame: ISO timestamp, then the 17 channels
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CsvSink {
    /// Create (or truncate) the log file and write the header
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", Self::header())?;
        info!("Logging frames to {}", path.display());

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Header row
    pub fn header() -> String {
        std::iter::once("timestamp_iso")
            .chain(Channel::ALL.iter().map(|c| c.name()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Format one data row (no line ending)
    pub fn format_row(frame: &Frame) -> String {
        let mut row = frame
            .received_at()
            .to_rfc3339_opts(SecondsFormat::Millis, false);
        for value in frame.values() {
            row.push(',');
            row.push_str(&value.to_string());
        }
        row
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far (header excluded)
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl FrameSink for CsvSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", Self::format_row(frame))?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
