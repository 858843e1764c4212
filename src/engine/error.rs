use crate::engine::model::{ErrorPhase, ErrorRecord};

pub const CANNOT_REACH_BACKEND: &str = "cannot reach backend";
pub const STREAM_CONNECTION_LOST: &str = "stream connection lost";
pub const FAILED_TO_FETCH_RESULT: &str = "failed to fetch result";

/// Failure of a single request/response exchange with the backend.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// No response reached us.
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// The server answered with a non-2xx status (or an unusable 2xx body).
    #[error("server rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// Failure of the progress channel itself, independent of frame content.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] anyhow::Error),

    #[error("server refused stream with status {0}")]
    Status(u16),

    #[error("stream read failed: {0}")]
    Read(#[source] anyhow::Error),
}

/// A frame that could not be parsed. Dropped by the stream, never surfaced.
#[derive(thiserror::Error, Debug)]
#[error("malformed progress frame: {source}")]
pub struct FrameError {
    #[from]
    source: serde_json::Error,
}

/// Everything that can end a job in `Error`.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("submission transport error: {0}")]
    SubmissionTransport(#[source] anyhow::Error),

    #[error("submission rejected: {detail}")]
    SubmissionRejected { status: u16, detail: String },

    #[error("remote pipeline failed: {0}")]
    StreamFatal(String),

    #[error("stream connection lost")]
    StreamConnectionLost,

    #[error("fetch transport error: {0}")]
    FetchTransport(#[source] anyhow::Error),

    #[error("fetch rejected: {detail}")]
    FetchRejected { status: u16, detail: String },
}

impl JobError {
    pub fn submission(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => Self::SubmissionTransport(e),
            ApiError::Rejected { status, detail } => Self::SubmissionRejected { status, detail },
        }
    }

    pub fn fetch(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => Self::FetchTransport(e),
            ApiError::Rejected { status, detail } => Self::FetchRejected { status, detail },
        }
    }

    pub fn phase(&self) -> ErrorPhase {
        match self {
            Self::SubmissionTransport(_) | Self::SubmissionRejected { .. } => ErrorPhase::Submission,
            Self::StreamFatal(_) | Self::StreamConnectionLost => ErrorPhase::Streaming,
            Self::FetchTransport(_) | Self::FetchRejected { .. } => ErrorPhase::Fetching,
        }
    }

    /// Message shown to the user: the server's own description when there is one,
    /// otherwise the fixed fallback for the phase.
    pub fn user_message(&self) -> String {
        match self {
            Self::SubmissionTransport(_) => CANNOT_REACH_BACKEND.to_string(),
            Self::StreamConnectionLost => STREAM_CONNECTION_LOST.to_string(),
            Self::FetchTransport(_) => FAILED_TO_FETCH_RESULT.to_string(),
            Self::SubmissionRejected { detail, .. } | Self::FetchRejected { detail, .. } => {
                if detail.trim().is_empty() {
                    self.fallback().to_string()
                } else {
                    detail.clone()
                }
            }
            Self::StreamFatal(message) => {
                if message.trim().is_empty() {
                    self.fallback().to_string()
                } else {
                    message.clone()
                }
            }
        }
    }

    fn fallback(&self) -> &'static str {
        match self.phase() {
            ErrorPhase::Submission => CANNOT_REACH_BACKEND,
            ErrorPhase::Streaming => STREAM_CONNECTION_LOST,
            ErrorPhase::Fetching => FAILED_TO_FETCH_RESULT,
        }
    }

    pub fn into_record(self) -> ErrorRecord {
        ErrorRecord { message: self.user_message(), phase: self.phase() }
    }
}
