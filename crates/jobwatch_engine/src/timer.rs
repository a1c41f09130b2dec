use std::time::Duration;

use jobwatch_logging::jobwatch_trace;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::EngineEvent;

/// One-shot poll tick. Dropping the timer cancels it.
pub(crate) struct PollTimer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollTimer {
    pub(crate) fn arm(
        job_id: String,
        delay: Duration,
        events: UnboundedSender<EngineEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    jobwatch_trace!("Poll timer for {} cancelled", job_id);
                }
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(EngineEvent::PollDue { job_id });
                }
            }
        });
        Self { cancel, task }
    }

    /// True until the tick has fired or been cancelled.
    pub(crate) fn is_pending(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
