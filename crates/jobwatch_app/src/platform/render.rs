use jobwatch_core::{InterruptEvent, InterruptKind, JobId, JobStatus, MonitorViewModel, Phase};

/// Something to tell the user outside the regular view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Interrupt(InterruptEvent),
    Info(String),
    Warning(String),
}

/// Turns successive view models into terminal lines, printing each log line
/// once even though every snapshot carries the whole log.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    job_id: Option<JobId>,
    printed_logs: usize,
    last_phase: Option<Phase>,
    last_status: Option<JobStatus>,
    last_message: Option<String>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &MonitorViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        if view.message != self.last_message {
            if let Some(message) = &view.message {
                lines.push(message.clone());
            }
            self.last_message = view.message.clone();
        }

        match &view.job {
            Some(job) => {
                if self.job_id.as_ref() != Some(&job.job_id) {
                    self.job_id = Some(job.job_id.clone());
                    self.printed_logs = 0;
                    self.last_status = None;
                    lines.push(format!(
                        "Started {} job {} at {}",
                        job.kind,
                        job.job_id,
                        job.started_at.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                if job.logs.len() < self.printed_logs {
                    lines.push("-- log restarted --".to_string());
                    self.printed_logs = 0;
                }
                lines.extend(job.logs[self.printed_logs..].iter().cloned());
                self.printed_logs = job.logs.len();

                if self.last_status != Some(job.status) {
                    self.last_status = Some(job.status);
                    if job.status.is_terminal() {
                        lines.push(terminal_line(job.status, job.error.as_deref()));
                    }
                }
            }
            None => {
                self.job_id = None;
                self.printed_logs = 0;
                self.last_status = None;
            }
        }

        if self.last_phase != Some(view.phase) {
            if view.phase == Phase::Launching {
                lines.push("Starting job...".to_string());
            }
            self.last_phase = Some(view.phase);
        }

        lines
    }

    pub fn notice(&self, notice: &Notice) -> Vec<String> {
        match notice {
            Notice::Interrupt(event) => match &event.kind {
                InterruptKind::Captcha2fa { account: Some(account) } => vec![format!(
                    "!! {account} needs manual verification (CAPTCHA/2FA); the job pauses until it is solved"
                )],
                InterruptKind::Captcha2fa { account: None } => vec![
                    "!! An account needs manual verification (CAPTCHA/2FA)".to_string(),
                ],
                InterruptKind::BrowserClosed => {
                    vec![format!("!! Browser closed, stopping job {}", event.job_id)]
                }
            },
            Notice::Info(text) => vec![text.clone()],
            Notice::Warning(text) => vec![format!("warning: {text}")],
        }
    }
}

fn terminal_line(status: JobStatus, error: Option<&str>) -> String {
    match (status, error) {
        (JobStatus::Completed, _) => "Job completed".to_string(),
        (status, Some(error)) => format!("Job {status}: {error}"),
        (status, None) => format!("Job {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jobwatch_core::{JobKind, JobView};

    fn view(logs: &[&str], status: JobStatus) -> MonitorViewModel {
        MonitorViewModel {
            phase: if status.is_terminal() {
                Phase::Terminal
            } else {
                Phase::Running
            },
            job: Some(JobView {
                job_id: JobId::new("job-1"),
                kind: JobKind::DailyPost,
                status,
                started_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
                ended_at: None,
                error: None,
                logs: logs.iter().map(|line| line.to_string()).collect(),
            }),
            interrupts: Vec::new(),
            message: None,
            dirty: true,
        }
    }

    #[test]
    fn prints_each_log_line_once() {
        let mut renderer = TerminalRenderer::new();
        assert_eq!(
            renderer.render(&view(&["a"], JobStatus::Running)),
            vec!["Started daily post job job-1 at 2024-05-01 10:00:00", "a"]
        );
        assert_eq!(
            renderer.render(&view(&["a", "b", "c"], JobStatus::Running)),
            vec!["b", "c"]
        );
        assert!(renderer
            .render(&view(&["a", "b", "c"], JobStatus::Running))
            .is_empty());
        assert_eq!(
            renderer.render(&view(&["a", "b", "c"], JobStatus::Completed)),
            vec!["Job completed"]
        );
    }

    #[test]
    fn shrinking_log_is_reprinted() {
        let mut renderer = TerminalRenderer::new();
        renderer.render(&view(&["a", "b"], JobStatus::Running));
        assert_eq!(
            renderer.render(&view(&["x"], JobStatus::Running)),
            vec!["-- log restarted --", "x"]
        );
    }

    #[test]
    fn error_status_shows_server_message() {
        let mut renderer = TerminalRenderer::new();
        let mut failed = view(&[], JobStatus::Error);
        if let Some(job) = failed.job.as_mut() {
            job.error = Some("Upload rejected".to_string());
        }
        let lines = renderer.render(&failed);
        assert_eq!(lines.last().map(String::as_str), Some("Job error: Upload rejected"));
    }
}
