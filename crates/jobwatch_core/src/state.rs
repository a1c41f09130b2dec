use std::fmt;

use chrono::{DateTime, Utc};

use crate::view_model::{JobView, MonitorViewModel};
use crate::{InterruptEvent, JobKind, LaunchId, LogScanner, StatusUpdate};

/// Opaque, server-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
    Stopped,
}

impl JobStatus {
    /// Terminal statuses have no transition out.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Launching,
    Running,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

impl Job {
    pub fn running(id: JobId, kind: JobKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Running,
            started_at,
            ended_at: None,
            error: None,
            logs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingLaunch {
    launch_id: LaunchId,
    kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorState {
    phase: Phase,
    job: Option<Job>,
    pending_launch: Option<PendingLaunch>,
    last_launch_id: LaunchId,
    scanner: LogScanner,
    interrupts: Vec<InterruptEvent>,
    message: Option<String>,
    dirty: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn view(&self) -> MonitorViewModel {
        MonitorViewModel {
            phase: self.phase,
            job: self.job.as_ref().map(JobView::from_job),
            interrupts: self.interrupts.clone(),
            message: self.message.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns and clears the dirty flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Id of the job whose responses are still accepted.
    pub fn running_job_id(&self) -> Option<&JobId> {
        match self.phase {
            Phase::Running => self.job.as_ref().map(|job| &job.id),
            _ => None,
        }
    }

    pub(crate) fn is_running(&self, job_id: &JobId) -> bool {
        self.running_job_id() == Some(job_id)
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.dirty = true;
    }

    /// Drops the current job (if any) and waits for the reply to a new launch.
    pub(crate) fn begin_launch(&mut self, kind: JobKind) -> LaunchId {
        self.last_launch_id += 1;
        let launch_id = self.last_launch_id;
        self.pending_launch = Some(PendingLaunch { launch_id, kind });
        self.phase = Phase::Launching;
        self.job = None;
        self.scanner.reset();
        self.interrupts.clear();
        self.message = None;
        self.dirty = true;
        launch_id
    }

    /// Consumes the pending launch if `launch_id` is the current one.
    pub(crate) fn take_pending_launch(&mut self, launch_id: LaunchId) -> Option<JobKind> {
        match self.pending_launch {
            Some(pending) if pending.launch_id == launch_id && self.phase == Phase::Launching => {
                self.pending_launch = None;
                Some(pending.kind)
            }
            _ => None,
        }
    }

    pub(crate) fn start_job(&mut self, job: Job) {
        self.job = Some(job);
        self.phase = Phase::Running;
        self.dirty = true;
    }

    /// Replaces the visible log with `lines` and returns newly qualifying interrupts.
    pub(crate) fn apply_logs(&mut self, lines: Vec<String>, at: DateTime<Utc>) -> Vec<InterruptEvent> {
        let Some(job) = self.job.as_mut() else {
            return Vec::new();
        };
        let events = self.scanner.scan(&job.id, &lines, at);
        job.logs = lines;
        self.interrupts.extend(events.iter().cloned());
        self.dirty = true;
        events
    }

    /// Applies a status report; returns true if the job became terminal.
    pub(crate) fn apply_status(&mut self, report: StatusUpdate) -> bool {
        let Some(job) = self.job.as_mut() else {
            return false;
        };
        job.status = report.status;
        if let Some(started_at) = report.started_at {
            job.started_at = started_at;
        }
        if report.ended_at.is_some() {
            job.ended_at = report.ended_at;
        }
        if report.error.is_some() {
            job.error = report.error;
        }
        self.dirty = true;
        if job.status.is_terminal() {
            self.phase = Phase::Terminal;
            true
        } else {
            false
        }
    }

    /// Forces the running job to `stopped` locally, whatever the server thinks.
    pub(crate) fn force_stopped(&mut self, error: String, ended_at: Option<DateTime<Utc>>) {
        if let Some(job) = self.job.as_mut() {
            job.status = JobStatus::Stopped;
            job.error = Some(error);
            if ended_at.is_some() {
                job.ended_at = ended_at;
            }
        }
        self.phase = Phase::Terminal;
        self.dirty = true;
    }

    pub(crate) fn push_interrupt(&mut self, event: InterruptEvent) {
        self.interrupts.push(event);
        self.dirty = true;
    }

    /// Back to `Idle`: the job is dereferenced and late replies are ignored.
    pub(crate) fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.job = None;
        self.pending_launch = None;
        self.scanner.reset();
        self.interrupts.clear();
        self.dirty = true;
    }

    pub(crate) fn abort_launch(&mut self) {
        self.phase = Phase::Idle;
        self.pending_launch = None;
        self.dirty = true;
    }
}
