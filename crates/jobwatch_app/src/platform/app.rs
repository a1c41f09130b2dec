use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use clap::Parser;
use jobwatch_core::{update, JobStatus, LaunchForm, MonitorState, MonitorViewModel, Msg, Phase};
use jobwatch_engine::{
    BrowserCloseSignal, CredentialProvider, EngineEvent, EngineHandle, EngineSettings, JobApi,
    ReqwestJobApi, SessionContext,
};
use jobwatch_logging::{jobwatch_debug, jobwatch_info, jobwatch_warn};
use log::LevelFilter;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::cli::{monitor_command, Cli, Command, MONITOR_KEYS_HELP};
use super::commands;
use super::config::{load_config, AppConfig};
use super::effects::EffectRunner;
use super::logging;
use super::render::TerminalRenderer;

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(config.log_destination, level);
    jobwatch_info!(
        "Config {} with API {}",
        cli.config.display(),
        config.api_base_url
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(execute(cli, config))
}

async fn execute(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let session = Arc::new(match &cli.token {
        Some(token) => SessionContext::with_token(token.clone()),
        None => SessionContext::new(),
    });
    let api = Arc::new(
        ReqwestJobApi::new(config.api_settings(), session.clone())
            .context("failed to build the HTTP client")?,
    );

    if let Command::Login { username, password } = &cli.command {
        let token = api
            .login(username, password)
            .await
            .context("login failed")?;
        println!("{token}");
        return Ok(());
    }

    if !session.is_authenticated() {
        bail!("no bearer token; pass --token, set JOBWATCH_TOKEN, or run `jobwatch login`");
    }

    if let Some(form) = cli.command.launch_form() {
        return watch_job(api, session, &config, form).await;
    }

    let mut out = io::stdout();
    match cli.command {
        Command::Status { job_id } => commands::print_status(api.as_ref(), &job_id, &mut out).await,
        Command::Logs { job_id } => commands::print_logs(api.as_ref(), &job_id, &mut out).await,
        Command::Stop { job_id, reason } => {
            commands::stop(api.as_ref(), &job_id, &reason, &mut out).await
        }
        Command::DownloadLogs { job_id } => {
            commands::download_logs(api.as_ref(), &job_id, &config.download_dir, &mut out).await
        }
        Command::ClearLogs { job_id } => {
            commands::clear_logs(api.as_ref(), &job_id, &mut out).await
        }
        Command::List => commands::list_jobs(api.as_ref(), &mut out).await,
        Command::Stats => commands::print_stats(api.as_ref(), &mut out).await,
        Command::Accounts => commands::list_accounts(api.as_ref(), &mut out).await,
        Command::Responses { job_id } => {
            commands::print_responses(api.as_ref(), &job_id, &mut out).await
        }
        Command::Verify => {
            let token = session.bearer_token().unwrap_or_default();
            commands::verify_token(&api, &token, &mut out).await
        }
        Command::Logout => commands::logout(&api, &mut out).await,
        Command::ValidateMedia { media } => {
            commands::validate_media(&api, &media, &mut out).await
        }
        Command::Login { .. } | Command::DailyPost(_) | Command::Dm(_) | Command::Warmup(_) => {
            Ok(())
        }
    }
}

async fn watch_job(
    api: Arc<ReqwestJobApi>,
    session: Arc<SessionContext>,
    config: &AppConfig,
    form: LaunchForm,
) -> anyhow::Result<()> {
    let close_signal = BrowserCloseSignal::new();
    let interrupts = tokio::spawn(forward_ctrl_c(close_signal.clone()));

    let mut monitor = MonitorLoop::new(
        api,
        session,
        config.engine_settings(),
        close_signal,
        io::stdout(),
    );
    forward_stdin(monitor.input());
    eprintln!("Watching the job; {MONITOR_KEYS_HELP}");
    let view = monitor.run(Msg::LaunchRequested(form)).await;
    interrupts.abort();
    outcome(&view)
}

/// The first Ctrl-C closes the monitoring session like closing its browser;
/// a second one exits without waiting.
async fn forward_ctrl_c(close_signal: BrowserCloseSignal) {
    let mut presses = 0;
    while tokio::signal::ctrl_c().await.is_ok() {
        presses += 1;
        if presses > 1 {
            jobwatch_warn!("Second interrupt, exiting without waiting for the backend");
            std::process::exit(130);
        }
        eprintln!("Stopping job (press Ctrl-C again to quit immediately)");
        close_signal.fire();
    }
}

/// Reads monitor commands from stdin on a thread outside the runtime.
fn forward_stdin(input: UnboundedSender<Msg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match monitor_command(&line) {
                Some(msg) => {
                    if input.send(msg).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("Unknown command {:?}; {MONITOR_KEYS_HELP}", line.trim()),
            }
        }
        jobwatch_debug!("Stdin closed; keyboard commands off");
    });
}

fn outcome(view: &MonitorViewModel) -> anyhow::Result<()> {
    match &view.job {
        Some(job) if job.status == JobStatus::Completed => Ok(()),
        Some(job) => bail!(
            "job {} ended with status {}{}",
            job.job_id,
            job.status,
            job.error
                .as_deref()
                .map(|error| format!(": {error}"))
                .unwrap_or_default()
        ),
        None => bail!(
            "{}",
            view.message.as_deref().unwrap_or("job did not start")
        ),
    }
}

/// Drives one monitor: core state, engine effects, and terminal output.
pub struct MonitorLoop<W: Write> {
    state: MonitorState,
    runner: EffectRunner,
    events: UnboundedReceiver<EngineEvent>,
    renderer: TerminalRenderer,
    input: UnboundedReceiver<Msg>,
    input_tx: UnboundedSender<Msg>,
    out: W,
}

impl<W: Write> MonitorLoop<W> {
    pub fn new(
        api: Arc<dyn JobApi>,
        session: Arc<dyn CredentialProvider>,
        settings: EngineSettings,
        close_signal: BrowserCloseSignal,
        out: W,
    ) -> Self {
        let (engine, events) = EngineHandle::new(api, settings, close_signal);
        let (input_tx, input) = mpsc::unbounded_channel();
        Self {
            state: MonitorState::new(),
            runner: EffectRunner::new(engine, session),
            events,
            renderer: TerminalRenderer::new(),
            input,
            input_tx,
            out,
        }
    }

    /// Messages sent here are dispatched by `run` between engine events.
    pub fn input(&self) -> UnboundedSender<Msg> {
        self.input_tx.clone()
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;
        jobwatch_logging::set_job_context(self.state.job().map(|job| job.id.as_str()));

        if was_dirty {
            let view = self.state.view();
            let lines = self.renderer.render(&view);
            self.write_lines(lines);
        }
        self.runner.run(effects);
        self.flush_notices();
    }

    /// Runs until the job is over and every stop/download request has answered.
    /// Returns the view as it was before teardown.
    pub async fn run(&mut self, first: Msg) -> MonitorViewModel {
        self.dispatch(first);
        while !self.is_settled() {
            tokio::select! {
                biased;
                event = self.events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let Some(msg) = self.runner.map_event(event) {
                        self.dispatch(msg);
                    }
                }
                Some(msg) = self.input.recv() => self.dispatch(msg),
            }
            self.flush_notices();
        }
        let view = self.state.view();
        jobwatch_info!("Monitor settled in phase {:?}", view.phase);
        self.dispatch(Msg::Teardown);
        view
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state.phase(), Phase::Idle | Phase::Terminal) && self.runner.outstanding() == 0
    }

    pub fn has_armed_timer(&self) -> bool {
        self.runner.engine().has_armed_timer()
    }

    pub fn is_watching(&self) -> bool {
        self.runner.engine().is_watching()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn flush_notices(&mut self) {
        let lines: Vec<String> = self
            .runner
            .take_notices()
            .iter()
            .flat_map(|notice| self.renderer.notice(notice))
            .collect();
        self.write_lines(lines);
    }

    fn write_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            if let Err(err) = writeln!(self.out, "{line}") {
                jobwatch_warn!("Could not write to output: {}", err);
                return;
            }
        }
        let _ = self.out.flush();
    }
}
