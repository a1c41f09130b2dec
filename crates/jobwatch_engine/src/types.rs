use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Sequence number echoed back with the result of a start request.
pub type LaunchId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    DailyPost,
    DmAutomation,
    Warmup,
}

impl ScriptKind {
    pub fn start_path(self) -> &'static str {
        match self {
            ScriptKind::DailyPost => "/daily-post/start",
            ScriptKind::DmAutomation => "/dm-automation/start",
            ScriptKind::Warmup => "/warmup/start",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

/// Multipart job-start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub kind: ScriptKind,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartResponse {
    pub script_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Running,
    Completed,
    Error,
    Stopped,
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteStatus::Pending => "pending",
            RemoteStatus::Running => "running",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Error => "error",
            RemoteStatus::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Body of `GET /script/{id}/status`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    pub status: RemoteStatus,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub auto_stop: Option<bool>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl StatusReport {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_timestamp)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.end_time.as_deref().and_then(parse_timestamp)
    }
}

/// Body of `GET /script/{id}/logs`: always the full log, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LogSnapshot {
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StopResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One entry of `GET /scripts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub status: RemoteStatus,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of `GET /instagram-accounts/active`. Stored credentials are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub last_used: Option<String>,
}

/// A positive reply collected by a DM automation job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DmResponse {
    pub account: String,
    pub responder: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Body of `GET /script/{id}/responses`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ResponseReport {
    #[serde(default)]
    pub responses: Vec<DmResponse>,
    /// Set when the job left no responses file.
    #[serde(default)]
    pub message: Option<String>,
}

impl ResponseReport {
    /// Responses grouped by the sending account, in account order.
    pub fn by_account(&self) -> BTreeMap<&str, Vec<&DmResponse>> {
        let mut grouped: BTreeMap<&str, Vec<&DmResponse>> = BTreeMap::new();
        for response in &self.responses {
            grouped
                .entry(response.account.as_str())
                .or_default()
                .push(response);
        }
        grouped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct StatusCounts {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub running: usize,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub error: usize,
    #[serde(default)]
    pub stopped: usize,
}

/// Body of `GET /scripts/stats`. Admins see every user's jobs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub total_scripts: usize,
    #[serde(default)]
    pub running_scripts: usize,
    #[serde(default)]
    pub completed_scripts: usize,
    #[serde(default)]
    pub error_scripts: usize,
    #[serde(default)]
    pub stopped_scripts: usize,
    #[serde(default)]
    pub script_types: BTreeMap<String, StatusCounts>,
}

/// Claims of a token accepted by `POST /auth/verify-token`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of a successful `POST /daily-post/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaCheck {
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedJob {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    JobStarted {
        launch_id: LaunchId,
        result: Result<StartedJob, ApiError>,
    },
    PollDue {
        job_id: String,
    },
    LogsFetched {
        job_id: String,
        lines: Vec<String>,
        at: DateTime<Utc>,
    },
    StatusFetched {
        job_id: String,
        report: StatusReport,
    },
    PollFailed {
        job_id: String,
        error: ApiError,
    },
    BrowserClosed {
        job_id: String,
        at: DateTime<Utc>,
    },
    StopFinished {
        job_id: String,
        result: Result<StopResponse, ApiError>,
    },
    LogsDownloaded {
        job_id: String,
        result: Result<PathBuf, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Unauthorized,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    TooLarge { max_bytes: u64 },
    Attachment,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "unexpected response"),
            FailureKind::TooLarge { max_bytes } => write!(f, "response larger than {max_bytes} bytes"),
            FailureKind::Attachment => write!(f, "attachment unreadable"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// The backend emits RFC 3339 or naive ISO-8601 (server-local, read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
