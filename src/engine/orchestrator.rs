use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Collaborators;
use crate::engine::error::JobError;
use crate::engine::events::JobEvent;
use crate::engine::logs::LogAggregator;
use crate::engine::model::*;
use crate::engine::stream::{ProgressStream, StreamHandle, StreamObserver, StreamSignal};

const EVENT_CAPACITY: usize = 256;

/// Drives one job at a time through submit -> stream -> fetch.
///
/// Cheap to clone; all clones share the same job. Every asynchronous
/// completion is tagged with the generation it was issued under and dropped
/// once a `start` or `reset` has moved past it.
#[derive(Clone)]
pub struct JobOrchestrator {
    shared: Arc<Shared>,
}

struct Shared {
    collaborators: Collaborators,
    state: Mutex<State>,
    event_tx: broadcast::Sender<JobEvent>,
    status_tx: watch::Sender<JobStatus>,
}

struct State {
    job: Job,
    logs: LogAggregator,
    result: Option<ResultArtifact>,
    error: Option<ErrorRecord>,
    generation: u64,
    submission: Option<CancellationToken>,
    stream: Option<StreamHandle>,
    fetch: Option<JoinHandle<()>>,
    fetch_triggered: bool,
}

impl State {
    fn new() -> Self {
        Self {
            job: Job::new(),
            logs: LogAggregator::new(),
            result: None,
            error: None,
            generation: 0,
            submission: None,
            stream: None,
            fetch: None,
            fetch_triggered: false,
        }
    }

    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }
}

impl JobOrchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (status_tx, _) = watch::channel(JobStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                collaborators,
                state: Mutex::new(State::new()),
                event_tx,
                status_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn status(&self) -> JobStatus {
        *self.shared.status_tx.borrow()
    }

    pub async fn job_id(&self) -> Option<JobId> {
        self.shared.state.lock().await.job.id.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let st = self.shared.state.lock().await;
        Snapshot {
            status: st.job.status,
            job_id: st.job.id.clone(),
            progress: st.job.progress,
            logs: st.logs.lines().to_vec(),
            result: st.result.clone(),
            error: st.error.clone(),
            created_at: st.job.created_at,
        }
    }

    /// Starts a new job from `Idle` or `Error`. Returns `false` (and changes
    /// nothing) from any other state.
    ///
    /// Returns as soon as the job is in `Submitting`; the submission and
    /// everything after it run in the background. Follow the job with
    /// [`subscribe`](Self::subscribe) or [`wait_terminal`](Self::wait_terminal).
    pub async fn start(&self, input: AudioInput) -> bool {
        let mut st = self.shared.state.lock().await;
        if !st.job.status.accepts_start() {
            debug!(status = ?st.job.status, "start ignored");
            return false;
        }

        self.shared.clear(&mut st);
        self.shared.log_local(
            &mut st,
            format!("[INIT] Uploading {} ({:.2} MB)", input.filename, input.size_mb()),
        );
        self.shared.transition(&mut st, JobStatus::Submitting);

        let cancel = CancellationToken::new();
        st.submission = Some(cancel.clone());
        let generation = st.generation;
        drop(st);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run_submission(generation, cancel, input).await;
        });
        true
    }

    /// Back to `Idle` from anywhere, dropping the job and everything attached to it.
    pub async fn reset(&self) {
        let mut st = self.shared.state.lock().await;
        let was = st.job.status;
        self.shared.clear(&mut st);
        if was != JobStatus::Idle {
            info!(from = ?was, "reset");
            self.shared.transition(&mut st, JobStatus::Idle);
            let _ = self.shared.event_tx.send(JobEvent::Reset);
        }
    }

    /// Resolves with the terminal status once the current job reaches `Done` or `Error`.
    pub async fn wait_terminal(&self) -> JobStatus {
        let mut rx = self.shared.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return status;
            }
        }
    }
}

impl Shared {
    /// Tears down the current job: stream, pending submission and fetch are
    /// all cut loose and the generation moves on.
    fn clear(&self, st: &mut State) {
        st.close_stream();
        if let Some(cancel) = st.submission.take() {
            cancel.cancel();
        }
        if let Some(fetch) = st.fetch.take() {
            fetch.abort();
        }
        st.generation += 1;
        st.job = Job::new();
        st.logs.clear();
        st.result = None;
        st.error = None;
        st.fetch_triggered = false;
        self.status_tx.send_replace(JobStatus::Idle);
    }

    fn transition(&self, st: &mut State, status: JobStatus) {
        debug!(from = ?st.job.status, to = ?status, "status");
        st.job.status = status;
        self.status_tx.send_replace(status);
        let _ = self.event_tx.send(JobEvent::StatusChanged { status });
    }

    fn log_local(&self, st: &mut State, text: String) {
        let line = st.logs.push_local(text).clone();
        let _ = self.event_tx.send(JobEvent::Log(line));
    }

    fn log_stream(&self, st: &mut State, text: String) {
        let line = st.logs.push_stream(text).clone();
        let _ = self.event_tx.send(JobEvent::Log(line));
    }

    fn fail(&self, st: &mut State, err: JobError) {
        warn!(job_id = ?st.job.id, phase = ?err.phase(), error = %err, "job failed");
        let record = err.into_record();
        self.log_local(st, format!("[ERROR] {}", record.message));
        st.close_stream();
        st.error = Some(record.clone());
        self.transition(st, JobStatus::Error);
        let _ = self.event_tx.send(JobEvent::Failed(record));
    }

    fn record_progress(&self, st: &mut State, event: ProgressEvent) {
        st.job.progress = event.progress;
        let _ = self.event_tx.send(JobEvent::Progress { progress: event.progress });
        self.log_stream(st, event.message);
    }

    async fn on_signal(self: &Arc<Self>, generation: u64, signal: StreamSignal) {
        let mut st = self.state.lock().await;
        if st.generation != generation || st.job.status != JobStatus::Streaming {
            debug!(generation, current = st.generation, status = ?st.job.status, "ignoring stream signal");
            return;
        }

        match signal {
            StreamSignal::Progress(event) => self.record_progress(&mut st, event),
            StreamSignal::Complete(event) => {
                self.record_progress(&mut st, event);
                if st.fetch_triggered {
                    return;
                }
                st.fetch_triggered = true;
                st.close_stream();

                let Some(job_id) = st.job.id.clone() else {
                    return;
                };
                self.transition(&mut st, JobStatus::Fetching);
                let shared = Arc::clone(self);
                st.fetch = Some(tokio::spawn(async move {
                    shared.run_fetch(generation, job_id).await;
                }));
            }
            StreamSignal::Fatal(message) => self.fail(&mut st, JobError::StreamFatal(message)),
            StreamSignal::ConnectionLost => self.fail(&mut st, JobError::StreamConnectionLost),
        }
    }

    async fn run_submission(self: &Arc<Self>, generation: u64, cancel: CancellationToken, input: AudioInput) {
        let submitted = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "submission abandoned");
                return;
            }
            r = self.collaborators.submitter.submit(&input) => r,
        };

        let mut st = self.state.lock().await;
        if st.generation != generation {
            debug!(generation, "dropping stale submission response");
            return;
        }
        st.submission = None;

        match submitted {
            Ok(job_id) => {
                info!(%job_id, "job accepted");
                st.job.id = Some(job_id.clone());
                let _ = self.event_tx.send(JobEvent::Accepted { job_id: job_id.clone() });
                self.transition(&mut st, JobStatus::Streaming);

                let observer = Arc::new(JobObserver {
                    shared: Arc::downgrade(self),
                    generation,
                });
                st.stream = Some(ProgressStream::open(self.collaborators.transport.clone(), job_id, observer));
            }
            Err(e) => self.fail(&mut st, JobError::submission(e)),
        }
    }

    async fn run_fetch(&self, generation: u64, job_id: JobId) {
        let fetched = self.collaborators.fetcher.fetch(&job_id).await;

        let mut st = self.state.lock().await;
        if st.generation != generation || st.job.status != JobStatus::Fetching {
            debug!(%job_id, "dropping stale fetch response");
            return;
        }
        st.fetch = None;

        match fetched {
            Ok(artifact) => {
                info!(%job_id, bpm = artifact.bpm, filename = %artifact.filename, "result ready");
                let _ = self.event_tx.send(JobEvent::Completed {
                    bpm: artifact.bpm,
                    filename: artifact.filename.clone(),
                });
                st.result = Some(artifact);
                self.transition(&mut st, JobStatus::Done);
            }
            Err(e) => self.fail(&mut st, JobError::fetch(e)),
        }
    }
}

/// Routes one job's stream signals back into the orchestrator.
struct JobObserver {
    shared: Weak<Shared>,
    generation: u64,
}

#[async_trait]
impl StreamObserver for JobObserver {
    async fn on_signal(&self, signal: StreamSignal) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_signal(self.generation, signal).await;
        }
    }
}
