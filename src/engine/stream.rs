use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::ProgressTransport;
use crate::engine::error::FrameError;
use crate::engine::model::{JobId, ProgressEvent};

/// What one parsed frame (or the channel itself) means for the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Progress(ProgressEvent),
    /// `progress >= 100`; no further frames are read.
    Complete(ProgressEvent),
    /// `progress < 0`; the remote pipeline failed, message is its description.
    Fatal(String),
    ConnectionLost,
}

impl StreamSignal {
    pub fn classify(event: ProgressEvent) -> Self {
        if event.progress < 0 {
            Self::Fatal(event.message)
        } else if event.progress >= 100 {
            Self::Complete(event)
        } else {
            Self::Progress(event)
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

pub fn parse_frame(payload: &str) -> Result<ProgressEvent, FrameError> {
    Ok(serde_json::from_str(payload)?)
}

#[async_trait]
pub trait StreamObserver: Send + Sync + 'static {
    async fn on_signal(&self, signal: StreamSignal);
}

/// Owner's grip on an open stream. Closing is idempotent and dropping the
/// handle closes the stream.
#[derive(Debug)]
pub struct StreamHandle {
    job_id: JobId,
    token: CancellationToken,
}

impl StreamHandle {
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            debug!(job_id = %self.job_id, "closing progress stream");
            self.token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct ProgressStream;

impl ProgressStream {
    /// Connects in the background and feeds classified signals to `observer`
    /// until a terminal signal is delivered or the handle is closed.
    pub fn open(
        transport: Arc<dyn ProgressTransport>,
        job_id: JobId,
        observer: Arc<dyn StreamObserver>,
    ) -> StreamHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            run(transport, task_job_id, observer, task_token).await;
        });
        StreamHandle { job_id, token }
    }
}

async fn run(
    transport: Arc<dyn ProgressTransport>,
    job_id: JobId,
    observer: Arc<dyn StreamObserver>,
    token: CancellationToken,
) {
    let connected = tokio::select! {
        _ = token.cancelled() => return,
        r = transport.connect(&job_id) => r,
    };

    let mut frames = match connected {
        Ok(frames) => frames,
        Err(e) => {
            warn!(%job_id, error = %e, "progress stream failed to open");
            deliver(&token, observer.as_ref(), StreamSignal::ConnectionLost).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            n = frames.next() => n,
        };

        let signal = match next {
            Some(Ok(payload)) => match parse_frame(&payload) {
                Ok(event) => StreamSignal::classify(event),
                Err(e) => {
                    debug!(%job_id, error = %e, "dropping malformed progress frame");
                    continue;
                }
            },
            Some(Err(e)) => {
                warn!(%job_id, error = %e, "progress stream broke");
                StreamSignal::ConnectionLost
            }
            None => {
                warn!(%job_id, "progress stream ended before a terminal frame");
                StreamSignal::ConnectionLost
            }
        };

        if signal.is_terminal() {
            // hang up before handing the terminal signal over
            drop(frames);
            deliver(&token, observer.as_ref(), signal).await;
            token.cancel();
            return;
        }

        deliver(&token, observer.as_ref(), signal).await;
    }
}

async fn deliver(token: &CancellationToken, observer: &dyn StreamObserver, signal: StreamSignal) {
    if token.is_cancelled() {
        return;
    }
    observer.on_signal(signal).await;
}
