use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobwatch_logging::{jobwatch_debug, jobwatch_info, jobwatch_warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::JobApi;
use crate::persist::{log_file_name, AtomicFileWriter};
use crate::timer::PollTimer;
use crate::watcher::{BrowserCloseSignal, CloseWatch};
use crate::{ApiError, EngineEvent, FailureKind, LaunchId, StartRequest, StartedJob};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    /// Where downloaded job logs are written.
    pub download_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            download_dir: PathBuf::from("."),
        }
    }
}

/// Executes remote calls and timers; results come back on the event channel.
///
/// Must be driven from inside a tokio runtime. All methods return immediately.
pub struct EngineHandle {
    api: Arc<dyn JobApi>,
    settings: EngineSettings,
    close_signal: BrowserCloseSignal,
    events: UnboundedSender<EngineEvent>,
    timer: Option<PollTimer>,
    poll_scope: CancellationToken,
    close_watch: Option<CloseWatch>,
    /// Close-signal subscription taken when the current launch began.
    launch_close: Option<watch::Receiver<u64>>,
}

impl EngineHandle {
    pub fn new(
        api: Arc<dyn JobApi>,
        settings: EngineSettings,
        close_signal: BrowserCloseSignal,
    ) -> (Self, UnboundedReceiver<EngineEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let handle = Self {
            api,
            settings,
            close_signal,
            events,
            timer: None,
            poll_scope: CancellationToken::new(),
            close_watch: None,
            launch_close: None,
        };
        (handle, event_rx)
    }

    /// A close signalled from here on is delivered once the job's watcher is armed.
    pub fn start_job(&mut self, launch_id: LaunchId, request: StartRequest) {
        self.launch_close = Some(self.close_signal.subscribe());
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api
                .start_job(&request)
                .await
                .map(|started| StartedJob {
                    job_id: started.script_id,
                    started_at: Utc::now(),
                });
            if let Err(err) = &result {
                jobwatch_warn!("Launch {} failed: {}", launch_id, err);
            }
            let _ = events.send(EngineEvent::JobStarted { launch_id, result });
        });
    }

    /// Arms the next tick, replacing any pending one.
    pub fn schedule_poll(&mut self, job_id: String) {
        jobwatch_debug!(
            "Next poll for {} in {:?}",
            job_id,
            self.settings.poll_interval
        );
        self.timer = Some(PollTimer::arm(
            job_id,
            self.settings.poll_interval,
            self.events.clone(),
        ));
    }

    /// One tick: logs first, then status. Either failure ends the tick.
    pub fn poll(&self, job_id: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        let scope = self.poll_scope.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    jobwatch_debug!("In-flight poll for {} abandoned", job_id);
                }
                _ = poll_once(api.as_ref(), &job_id, &events) => {}
            }
        });
    }

    /// Disarms the timer and abandons in-flight poll fetches.
    pub fn cancel_poll(&mut self) {
        self.timer = None;
        self.poll_scope.cancel();
        self.poll_scope = CancellationToken::new();
    }

    pub fn watch_browser_close(&mut self, job_id: String) {
        let signal = self
            .launch_close
            .take()
            .unwrap_or_else(|| self.close_signal.subscribe());
        self.close_watch = Some(CloseWatch::arm(signal, job_id, self.events.clone()));
    }

    pub fn detach_watchers(&mut self) {
        self.close_watch = None;
        self.launch_close = None;
    }

    pub fn stop_job(&self, job_id: String, reason: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.stop_job(&job_id, &reason).await;
            match &result {
                Ok(response) => jobwatch_info!("Stop for {} acknowledged: {}", job_id, response.status),
                Err(err) => jobwatch_warn!("Stop for {} failed: {}", job_id, err),
            }
            let _ = events.send(EngineEvent::StopFinished { job_id, result });
        });
    }

    pub fn download_logs(&self, job_id: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        let dir = self.settings.download_dir.clone();
        tokio::spawn(async move {
            let result = download_to(api.as_ref(), &job_id, dir).await;
            let _ = events.send(EngineEvent::LogsDownloaded { job_id, result });
        });
    }

    pub fn has_armed_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(PollTimer::is_pending)
    }

    pub fn is_watching(&self) -> bool {
        self.close_watch.is_some()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.poll_scope.cancel();
    }
}

async fn poll_once(api: &dyn JobApi, job_id: &str, events: &UnboundedSender<EngineEvent>) {
    match api.job_logs(job_id).await {
        Ok(snapshot) => {
            let _ = events.send(EngineEvent::LogsFetched {
                job_id: job_id.to_string(),
                lines: snapshot.logs,
                at: Utc::now(),
            });
        }
        Err(error) => {
            jobwatch_warn!("Log fetch for {} failed: {}", job_id, error);
            let _ = events.send(EngineEvent::PollFailed {
                job_id: job_id.to_string(),
                error,
            });
            return;
        }
    }

    let event = match api.job_status(job_id).await {
        Ok(report) => EngineEvent::StatusFetched {
            job_id: job_id.to_string(),
            report,
        },
        Err(error) => {
            jobwatch_warn!("Status fetch for {} failed: {}", job_id, error);
            EngineEvent::PollFailed {
                job_id: job_id.to_string(),
                error,
            }
        }
    };
    let _ = events.send(event);
}

async fn download_to(api: &dyn JobApi, job_id: &str, dir: PathBuf) -> Result<PathBuf, ApiError> {
    let bytes = api.download_logs(job_id).await?;
    let filename = log_file_name(job_id);
    let written = tokio::task::spawn_blocking(move || {
        AtomicFileWriter::new(dir).write(&filename, &bytes)
    })
    .await
    .map_err(|err| ApiError::new(FailureKind::Io, err.to_string()))?
    .map_err(|err| ApiError::new(FailureKind::Io, err.to_string()))?;
    jobwatch_info!("Saved logs for {} to {}", job_id, written.display());
    Ok(written)
}
