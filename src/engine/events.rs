use crate::engine::model::{ErrorRecord, JobId, JobStatus, LogLine};

#[derive(Debug, Clone)]
pub enum JobEvent {
    StatusChanged { status: JobStatus },
    Accepted { job_id: JobId },
    Progress { progress: i32 },
    Log(LogLine),
    Completed { bpm: f64, filename: String },
    Failed(ErrorRecord),
    Reset,
}
