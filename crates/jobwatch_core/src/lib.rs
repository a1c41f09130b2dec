//! Jobwatch core: pure job-monitor state machine and view-model helpers.
mod effect;
mod launch;
mod msg;
mod scanner;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use launch::{
    DailyPostForm, DmAutomationForm, FormPart, JobKind, JobSubmission, LaunchForm,
    ValidationError, WarmupForm, WarmupSettings,
};
pub use msg::{LaunchId, Msg, RemoteFailure, StatusUpdate};
pub use scanner::{account_from_line, is_interrupt_line, InterruptEvent, InterruptKind, LogScanner};
pub use state::{Job, JobId, JobStatus, MonitorState, Phase};
pub use update::{update, BROWSER_CLOSED_REASON, USER_STOP_REASON};
pub use view_model::{JobView, MonitorViewModel};
