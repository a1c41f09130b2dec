use std::sync::Arc;

use chrono::Utc;
use jobwatch_logging::{jobwatch_info, jobwatch_trace};
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio_util::sync::CancellationToken;

use crate::EngineEvent;

/// Out-of-band "the job's browser went away" signal.
///
/// Clones share one channel. A fire while a launch is in flight is held for
/// that launch's job; any other fire with no armed watcher is lost, so a close
/// signalled between jobs cannot hit the next one.
#[derive(Debug, Clone)]
pub struct BrowserCloseSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for BrowserCloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserCloseSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn fire(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Watcher bound to a single job id; detached when dropped.
pub(crate) struct CloseWatch {
    cancel: CancellationToken,
}

impl CloseWatch {
    /// `rx` must be subscribed before the caller returns so a fire right after
    /// arming is seen. A change it has not yet marked seen fires immediately.
    pub(crate) fn arm(
        mut rx: watch::Receiver<u64>,
        job_id: String,
        events: UnboundedSender<EngineEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    jobwatch_trace!("Close watcher for {} detached", job_id);
                }
                changed = rx.changed() => {
                    if changed.is_ok() {
                        jobwatch_info!("Browser closed while job {} was running", job_id);
                        let _ = events.send(EngineEvent::BrowserClosed {
                            job_id,
                            at: Utc::now(),
                        });
                    }
                }
            }
        });
        Self { cancel }
    }
}

impl Drop for CloseWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
