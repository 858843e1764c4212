use bytes::Bytes;
use serde::Deserialize;
use std::time::SystemTime;

/// Opaque job identifier assigned by the backend.
pub type JobId = String;

#[derive(Debug, Clone)]
pub struct AudioInput {
    pub filename: String,
    pub data: Bytes,
}

impl AudioInput {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), data: data.into() }
    }

    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / 1e6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Fetching,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming | Self::Fetching)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Only a fresh or failed orchestrator takes a new job; `Done` waits for a reset.
    pub fn accepts_start(self) -> bool {
        !self.is_active() && self != Self::Done
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Option<JobId>,
    pub status: JobStatus,
    /// Last value reported by the stream, verbatim.
    pub progress: i32,
    pub created_at: SystemTime,
}

impl Job {
    pub fn new() -> Self {
        Self { id: None, status: JobStatus::Idle, progress: 0, created_at: SystemTime::now() }
    }
}

/// One frame of the progress stream: `{ "progress": int, "message": string }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgressEvent {
    pub progress: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    Local,
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub origin: LogOrigin,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultArtifact {
    pub bpm: f64,
    /// Base64 MIDI payload, left encoded for the download step.
    #[serde(rename = "midi_b64")]
    pub encoded_artifact: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Submission,
    Streaming,
    Fetching,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    pub phase: ErrorPhase,
}

/// Read-only view of the orchestrator handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub status: JobStatus,
    pub job_id: Option<JobId>,
    pub progress: i32,
    pub logs: Vec<LogLine>,
    pub result: Option<ResultArtifact>,
    pub error: Option<ErrorRecord>,
    pub created_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_and_error_accept_a_new_job() {
        assert!(JobStatus::Idle.accepts_start());
        assert!(JobStatus::Error.accepts_start());
        for status in [JobStatus::Submitting, JobStatus::Streaming, JobStatus::Fetching, JobStatus::Done] {
            assert!(!status.accepts_start(), "{status:?}");
        }
    }

    #[test]
    fn progress_frame_message_defaults_to_empty() {
        let event: ProgressEvent = serde_json::from_str(r#"{"progress": -1}"#).unwrap();
        assert_eq!(event, ProgressEvent { progress: -1, message: String::new() });
    }
}
