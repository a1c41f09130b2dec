use chrono::{DateTime, Utc};

use crate::{InterruptEvent, Job, JobId, JobKind, JobStatus, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorViewModel {
    pub phase: Phase,
    pub job: Option<JobView>,
    pub interrupts: Vec<InterruptEvent>,
    /// Last user-facing message (validation failure, launch error, stop notice).
    pub message: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

impl JobView {
    pub(crate) fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            started_at: job.started_at,
            ended_at: job.ended_at,
            error: job.error.clone(),
            logs: job.logs.clone(),
        }
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }
}
