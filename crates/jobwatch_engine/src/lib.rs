//! Jobwatch engine: REST client, poll timer, and browser-close watcher.
mod api;
mod engine;
mod persist;
mod session;
mod timer;
mod types;
mod watcher;

pub use api::{ApiSettings, JobApi, ReqwestJobApi};
pub use engine::{EngineHandle, EngineSettings};
pub use persist::{ensure_output_dir, log_file_name, AtomicFileWriter, PersistError};
pub use session::{CredentialProvider, SessionContext};
pub use types::{
    parse_timestamp, Account, ApiError, DmResponse, EngineEvent, FailureKind, FormField, JobStats,
    JobSummary, LaunchId, LogSnapshot, MediaCheck, RemoteStatus, ResponseReport, ScriptKind,
    StartRequest, StartResponse, StartedJob, StatusCounts, StatusReport, StopResponse, TokenInfo,
};
pub use watcher::BrowserCloseSignal;
