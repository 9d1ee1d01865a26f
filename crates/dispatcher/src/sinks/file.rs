//! FileSink - appends records to a JSON Lines file

use contracts::{ContractError, ParsedRecord, RecordSink};
use serde_json::json;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, one JSON object per line
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output").join(format!("{name}.jsonl")));

        Self { path }
    }
}

/// Sink that appends each record as a JSON line
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let config = FileSinkConfig::from_params(&name, params);
        Self::new(name, config)
    }

    /// Output file path
    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn writer(&self) -> MutexGuard<'_, BufWriter<File>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_line(&self, record: &ParsedRecord) -> std::io::Result<()> {
        let line = json!({
            "topic": record.topic(),
            "sequence": record.sequence(),
            "data": record.data,
        });
        let mut writer = self.writer();
        serde_json::to_writer(&mut *writer, &line)?;
        writer.write_all(b"\n")
    }

    fn flush_writer(&self) -> Result<(), ContractError> {
        self.writer().flush().map_err(|e| {
            error!(sink = %self.name, error = %e, "Flush failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_process",
        skip(self, record),
        fields(sink = %self.name, sequence = record.sequence())
    )]
    async fn process(&self, record: &ParsedRecord) -> Result<(), ContractError> {
        self.append_line(record).map_err(|e| {
            error!(sink = %self.name, sequence = record.sequence(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        self.flush_writer()
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.flush_writer()?;
        debug!(sink = %self.name, path = %self.config.path.display(), "FileSink closed");
        Ok(())
    }
}
