use std::sync::Arc;

use jobwatch_core::{
    Effect, FormPart, JobId, JobKind, JobStatus, JobSubmission, Msg, RemoteFailure, StatusUpdate,
};
use jobwatch_engine::{
    ApiError, CredentialProvider, EngineEvent, EngineHandle, FailureKind, FormField, RemoteStatus,
    ScriptKind, StartRequest, StatusReport,
};
use jobwatch_logging::{jobwatch_debug, jobwatch_info, jobwatch_warn};

use super::render::Notice;

/// Carries core effects out through the engine and brings engine events back
/// as core messages.
pub struct EffectRunner {
    engine: EngineHandle,
    session: Arc<dyn CredentialProvider>,
    outstanding: usize,
    notices: Vec<Notice>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, session: Arc<dyn CredentialProvider>) -> Self {
        Self {
            engine,
            session,
            outstanding: 0,
            notices: Vec::new(),
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            jobwatch_debug!("Effect {}", effect_name(&effect));
            match effect {
                Effect::StartJob {
                    launch_id,
                    submission,
                } => {
                    jobwatch_info!(
                        "StartJob launch_id={} kind={} parts={}",
                        launch_id,
                        submission.kind,
                        submission.parts.len()
                    );
                    self.engine.start_job(launch_id, start_request(submission));
                }
                Effect::SchedulePoll { job_id } => self.engine.schedule_poll(job_id.to_string()),
                Effect::Poll { job_id } => self.engine.poll(job_id.to_string()),
                Effect::CancelPoll => self.engine.cancel_poll(),
                Effect::WatchBrowserClose { job_id } => {
                    self.engine.watch_browser_close(job_id.to_string())
                }
                Effect::DetachWatchers => self.engine.detach_watchers(),
                Effect::StopJob { job_id, reason } => {
                    jobwatch_info!("StopJob job_id={} reason={:?}", job_id, reason);
                    self.outstanding += 1;
                    self.engine.stop_job(job_id.to_string(), reason);
                }
                Effect::NotifyInterrupt(event) => {
                    jobwatch_warn!("Interrupt on job {}: {:?}", event.job_id, event.kind);
                    self.notices.push(Notice::Interrupt(event));
                }
                Effect::DownloadLogs { job_id } => {
                    self.outstanding += 1;
                    self.engine.download_logs(job_id.to_string());
                }
                Effect::ResetSession => {
                    jobwatch_warn!("Credential rejected; clearing session");
                    self.session.invalidate();
                    self.notices.push(Notice::Warning(
                        "session expired; run `jobwatch login` and set JOBWATCH_TOKEN".to_string(),
                    ));
                }
            }
        }
    }

    /// Converts an engine event into a message for `update`, if it has one.
    pub fn map_event(&mut self, event: EngineEvent) -> Option<Msg> {
        match event {
            EngineEvent::JobStarted { launch_id, result } => Some(match result {
                Ok(started) => Msg::LaunchSucceeded {
                    launch_id,
                    job_id: JobId::new(started.job_id),
                    started_at: started.started_at,
                },
                Err(error) => Msg::LaunchFailed {
                    launch_id,
                    failure: remote_failure(&error),
                },
            }),
            EngineEvent::PollDue { job_id } => Some(Msg::PollDue {
                job_id: JobId::new(job_id),
            }),
            EngineEvent::LogsFetched { job_id, lines, at } => Some(Msg::LogsFetched {
                job_id: JobId::new(job_id),
                lines,
                at,
            }),
            EngineEvent::StatusFetched { job_id, report } => Some(Msg::StatusFetched {
                job_id: JobId::new(job_id),
                report: status_update(&report),
            }),
            EngineEvent::PollFailed { job_id, error } => Some(Msg::PollFailed {
                job_id: JobId::new(job_id),
                failure: remote_failure(&error),
            }),
            EngineEvent::BrowserClosed { job_id, at } => Some(Msg::BrowserClosed {
                job_id: JobId::new(job_id),
                at,
            }),
            EngineEvent::StopFinished { job_id, result } => {
                self.finish_request();
                if let Err(error) = result {
                    self.notices.push(Notice::Warning(format!(
                        "remote stop for {job_id} failed: {error}"
                    )));
                }
                None
            }
            EngineEvent::LogsDownloaded { job_id, result } => {
                self.finish_request();
                self.notices.push(match result {
                    Ok(path) => Notice::Info(format!("Saved logs for {job_id} to {}", path.display())),
                    Err(error) => Notice::Warning(format!("log download for {job_id} failed: {error}")),
                });
                None
            }
        }
    }

    /// Stop and download requests that have not reported back yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    fn finish_request(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

fn effect_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::StartJob { .. } => "StartJob",
        Effect::SchedulePoll { .. } => "SchedulePoll",
        Effect::Poll { .. } => "Poll",
        Effect::CancelPoll => "CancelPoll",
        Effect::WatchBrowserClose { .. } => "WatchBrowserClose",
        Effect::DetachWatchers => "DetachWatchers",
        Effect::StopJob { .. } => "StopJob",
        Effect::NotifyInterrupt(_) => "NotifyInterrupt",
        Effect::DownloadLogs { .. } => "DownloadLogs",
        Effect::ResetSession => "ResetSession",
    }
}

fn start_request(submission: JobSubmission) -> StartRequest {
    StartRequest {
        kind: script_kind(submission.kind),
        fields: submission
            .parts
            .into_iter()
            .map(|part| match part {
                FormPart::Text { name, value } => FormField::Text { name, value },
                FormPart::File { name, path } => FormField::File { name, path },
            })
            .collect(),
    }
}

fn script_kind(kind: JobKind) -> ScriptKind {
    match kind {
        JobKind::DailyPost => ScriptKind::DailyPost,
        JobKind::DmAutomation => ScriptKind::DmAutomation,
        JobKind::Warmup => ScriptKind::Warmup,
    }
}

fn job_status(status: RemoteStatus) -> JobStatus {
    match status {
        RemoteStatus::Pending => JobStatus::Pending,
        RemoteStatus::Running => JobStatus::Running,
        RemoteStatus::Completed => JobStatus::Completed,
        RemoteStatus::Error => JobStatus::Error,
        RemoteStatus::Stopped => JobStatus::Stopped,
    }
}

fn status_update(report: &StatusReport) -> StatusUpdate {
    StatusUpdate {
        status: job_status(report.status),
        started_at: report.started_at(),
        ended_at: report.ended_at(),
        error: report.error.clone().or_else(|| report.stop_reason.clone()),
    }
}

/// Server-side messages are shown as sent; other failures keep their kind.
fn remote_failure(error: &ApiError) -> RemoteFailure {
    match error.kind {
        FailureKind::Unauthorized => RemoteFailure::Unauthorized,
        FailureKind::HttpStatus(_) => RemoteFailure::Transport(error.message.clone()),
        _ => RemoteFailure::Transport(error.to_string()),
    }
}
