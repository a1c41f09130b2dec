use crate::{InterruptEvent, JobId, JobSubmission, LaunchId};

/// Side effects requested by `update`; the app executes them against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Submit a job-start request. The reply must echo `launch_id`.
    StartJob {
        launch_id: LaunchId,
        submission: JobSubmission,
    },
    /// Arm the one-shot poll timer for `job_id`, replacing any armed timer.
    SchedulePoll { job_id: JobId },
    /// Fetch logs, then status, for `job_id`.
    Poll { job_id: JobId },
    /// Disarm the poll timer and abandon in-flight poll fetches.
    CancelPoll,
    /// Arm the browser-close watcher for `job_id`.
    WatchBrowserClose { job_id: JobId },
    /// Disarm the browser-close watcher.
    DetachWatchers,
    /// Best-effort remote stop.
    StopJob { job_id: JobId, reason: String },
    /// Surface an interrupt notification to the user.
    NotifyInterrupt(InterruptEvent),
    /// Download the full log file for `job_id`.
    DownloadLogs { job_id: JobId },
    /// The credential was rejected; clear the session and ask for a new login.
    ResetSession,
}
