use std::fmt;

use chrono::{DateTime, Utc};

use crate::{JobId, JobStatus, LaunchForm};

/// Sequence number of a launch attempt; replies to older attempts are ignored.
pub type LaunchId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User submitted a launch form.
    LaunchRequested(LaunchForm),
    /// The server accepted a job-start request.
    LaunchSucceeded {
        launch_id: LaunchId,
        job_id: JobId,
        started_at: DateTime<Utc>,
    },
    /// The job-start request failed.
    LaunchFailed {
        launch_id: LaunchId,
        failure: RemoteFailure,
    },
    /// The poll timer fired.
    PollDue { job_id: JobId },
    /// A log snapshot arrived (full replace).
    LogsFetched {
        job_id: JobId,
        lines: Vec<String>,
        at: DateTime<Utc>,
    },
    /// A status report arrived.
    StatusFetched { job_id: JobId, report: StatusUpdate },
    /// Either poll fetch failed.
    PollFailed {
        job_id: JobId,
        failure: RemoteFailure,
    },
    /// The browser window (monitoring session) of a job was closed.
    BrowserClosed { job_id: JobId, at: DateTime<Utc> },
    /// User clicked Stop.
    StopClicked,
    /// User asked for the full log file.
    DownloadLogsClicked,
    /// The monitor is going away.
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// Remote call failure as seen by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The bearer credential was rejected.
    Unauthorized,
    /// Anything else: unreachable server, non-2xx status, undecodable body.
    Transport(String),
}

impl RemoteFailure {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteFailure::Unauthorized)
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::Unauthorized => write!(f, "session expired, please log in again"),
            RemoteFailure::Transport(message) => write!(f, "{message}"),
        }
    }
}
