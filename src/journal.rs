//! JSONL session journal: one line per session lifecycle event.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecorderError, Result};
use crate::session::RecordingStats;
use crate::upload::UploadReceipt;

/// Session event types for JSONL logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SessionEvent {
    #[serde(rename = "session_start")]
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
    },
    #[serde(rename = "recording_finished")]
    RecordingFinished {
        timestamp: DateTime<Utc>,
        frames_written: u64,
        target_duration_secs: f64,
        actual_duration_secs: f64,
        file_size_bytes: u64,
        short_recording: bool,
    },
    #[serde(rename = "upload_result")]
    UploadResult {
        timestamp: DateTime<Utc>,
        ok: bool,
        diagnostic: String,
        upload_duration_ms: u64,
    },
}

/// Append-only JSONL writer for one recording session.
pub struct SessionJournal {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SessionJournal {
    /// Create the journal file next to the recordings.
    pub fn create(dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| RecorderError::io(dir, e))?;
        let path = dir.join(format!(
            "session_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let file = File::create(&path).map_err(|e| RecorderError::io(&path, e))?;
        debug!(path = %path.display(), "session journal opened");
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn log_session_start(&mut self, version: &str) -> Result<()> {
        self.write_event(&SessionEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
        })
    }

    pub fn log_recording_finished(
        &mut self,
        stats: &RecordingStats,
        short_recording: bool,
    ) -> Result<()> {
        self.write_event(&SessionEvent::RecordingFinished {
            timestamp: Utc::now(),
            frames_written: stats.frames_written,
            target_duration_secs: stats.target_duration.as_secs_f64(),
            actual_duration_secs: stats.actual_duration.as_secs_f64(),
            file_size_bytes: stats.file_size_bytes,
            short_recording,
        })
    }

    pub fn log_upload_result(&mut self, receipt: &UploadReceipt) -> Result<()> {
        self.write_event(&SessionEvent::UploadResult {
            timestamp: Utc::now(),
            ok: receipt.ok,
            diagnostic: receipt.diagnostic.clone(),
            upload_duration_ms: receipt.upload_duration_ms,
        })
    }

    fn write_event(&mut self, event: &SessionEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(|e| {
            RecorderError::io(&self.path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        writeln!(self.writer, "{line}").map_err(|e| RecorderError::io(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| RecorderError::io(&self.path, e))
    }
}
