use crate::{Effect, InterruptEvent, Job, MonitorState, Msg, Phase, RemoteFailure};

/// Reason sent with the remote stop when the user clicks Stop.
pub const USER_STOP_REASON: &str = "Script stopped by user";
/// Reason sent (and shown) when the job's browser window goes away.
pub const BROWSER_CLOSED_REASON: &str = "Browser closed by user";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: MonitorState, msg: Msg) -> (MonitorState, Vec<Effect>) {
    let effects = match msg {
        Msg::LaunchRequested(form) => match form.validate() {
            Err(err) => {
                state.set_message(err.to_string());
                Vec::new()
            }
            Ok(submission) => {
                // One timer per monitor: the previous job stops being watched first.
                let mut effects = disarm_if_running(&state);
                let launch_id = state.begin_launch(submission.kind);
                effects.push(Effect::StartJob {
                    launch_id,
                    submission,
                });
                effects
            }
        },
        Msg::LaunchSucceeded {
            launch_id,
            job_id,
            started_at,
        } => match state.take_pending_launch(launch_id) {
            Some(kind) => {
                state.start_job(Job::running(job_id.clone(), kind, started_at));
                vec![
                    Effect::SchedulePoll {
                        job_id: job_id.clone(),
                    },
                    Effect::WatchBrowserClose { job_id },
                ]
            }
            None => Vec::new(),
        },
        Msg::LaunchFailed { launch_id, failure } => {
            if state.take_pending_launch(launch_id).is_none() {
                return (state, Vec::new());
            }
            state.abort_launch();
            state.set_message(format!("Failed to start job: {failure}"));
            session_reset_for(&failure)
        }
        Msg::PollDue { job_id } => {
            if state.is_running(&job_id) {
                vec![Effect::Poll { job_id }]
            } else {
                Vec::new()
            }
        }
        Msg::LogsFetched { job_id, lines, at } => {
            if !state.is_running(&job_id) {
                return (state, Vec::new());
            }
            state
                .apply_logs(lines, at)
                .into_iter()
                .map(Effect::NotifyInterrupt)
                .collect()
        }
        Msg::StatusFetched { job_id, report } => {
            if !state.is_running(&job_id) {
                return (state, Vec::new());
            }
            if state.apply_status(report) {
                vec![Effect::CancelPoll, Effect::DetachWatchers]
            } else {
                vec![Effect::SchedulePoll { job_id }]
            }
        }
        Msg::PollFailed { job_id, failure } => {
            if !state.is_running(&job_id) {
                return (state, Vec::new());
            }
            // No retry: the remote status is unknown, but the job is reported stopped.
            state.force_stopped(format!("Lost contact with server: {failure}"), None);
            let mut effects = vec![Effect::CancelPoll, Effect::DetachWatchers];
            effects.extend(session_reset_for(&failure));
            effects
        }
        Msg::BrowserClosed { job_id, at } => {
            if !state.is_running(&job_id) {
                return (state, Vec::new());
            }
            state.force_stopped(BROWSER_CLOSED_REASON.to_string(), Some(at));
            let event = InterruptEvent::browser_closed(job_id.clone(), at);
            state.push_interrupt(event.clone());
            vec![
                Effect::CancelPoll,
                Effect::DetachWatchers,
                Effect::StopJob {
                    job_id,
                    reason: BROWSER_CLOSED_REASON.to_string(),
                },
                Effect::NotifyInterrupt(event),
            ]
        }
        Msg::StopClicked => match state.phase() {
            Phase::Running => {
                let effects = stop_running_job(&state);
                state.reset_to_idle();
                state.set_message("Job stopped");
                effects
            }
            Phase::Launching | Phase::Terminal => {
                state.reset_to_idle();
                Vec::new()
            }
            Phase::Idle => Vec::new(),
        },
        Msg::DownloadLogsClicked => match state.job() {
            Some(job) => vec![Effect::DownloadLogs {
                job_id: job.id.clone(),
            }],
            None => Vec::new(),
        },
        Msg::Teardown => {
            if state.phase() == Phase::Idle {
                return (state, Vec::new());
            }
            let effects = disarm_if_running(&state);
            state.reset_to_idle();
            effects
        }
    };

    (state, effects)
}

fn disarm_if_running(state: &MonitorState) -> Vec<Effect> {
    if state.running_job_id().is_some() {
        vec![Effect::CancelPoll, Effect::DetachWatchers]
    } else {
        Vec::new()
    }
}

fn stop_running_job(state: &MonitorState) -> Vec<Effect> {
    let Some(job_id) = state.running_job_id().cloned() else {
        return Vec::new();
    };
    vec![
        Effect::CancelPoll,
        Effect::DetachWatchers,
        Effect::StopJob {
            job_id,
            reason: USER_STOP_REASON.to_string(),
        },
    ]
}

fn session_reset_for(failure: &RemoteFailure) -> Vec<Effect> {
    if failure.is_unauthorized() {
        vec![Effect::ResetSession]
    } else {
        Vec::new()
    }
}
