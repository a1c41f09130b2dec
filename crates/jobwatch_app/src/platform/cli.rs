use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jobwatch_core::{
    DailyPostForm, DmAutomationForm, LaunchForm, Msg, WarmupForm, WarmupSettings,
    USER_STOP_REASON,
};

use super::config::DEFAULT_CONFIG_FILE;

/// Start automation jobs on the backend and watch them until they finish.
#[derive(Parser, Debug)]
#[command(name = "jobwatch", version, long_about = None)]
pub struct Cli {
    /// RON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the API base URL from the config file
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, env = "JOBWATCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and print a bearer token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "JOBWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Check the bearer token and print whose it is
    Verify,
    /// End the session on the backend
    Logout,
    /// Start a daily post job and watch it
    DailyPost(DailyPostArgs),
    /// Start a DM automation job and watch it
    Dm(DmArgs),
    /// Start an account warm-up job and watch it
    Warmup(WarmupArgs),
    /// Print a job's status once
    Status { job_id: String },
    /// Print a job's current log
    Logs { job_id: String },
    /// Ask the backend to stop a job
    Stop {
        job_id: String,
        #[arg(long, default_value = USER_STOP_REASON)]
        reason: String,
    },
    /// Save a job's full log file into the download directory
    DownloadLogs { job_id: String },
    /// Clear a job's server-side log
    ClearLogs { job_id: String },
    /// List known jobs
    List,
    /// Print job counts per status and type
    Stats,
    /// List the active accounts a job can run on
    Accounts,
    /// Print the replies a DM automation job collected
    Responses { job_id: String },
    /// Ask the backend whether a file is acceptable daily-post media
    ValidateMedia { media: PathBuf },
}

impl Command {
    /// The launch form for commands that start a job.
    pub fn launch_form(&self) -> Option<LaunchForm> {
        match self {
            Command::DailyPost(args) => Some(LaunchForm::DailyPost(args.to_form())),
            Command::Dm(args) => Some(LaunchForm::DmAutomation(args.to_form())),
            Command::Warmup(args) => Some(LaunchForm::Warmup(args.to_form())),
            _ => None,
        }
    }
}

/// Keys accepted on stdin while a job is being watched.
pub const MONITOR_KEYS_HELP: &str = "type s + Enter to stop the job, d + Enter to download its logs";

/// Maps one stdin line to a monitor message.
pub fn monitor_command(line: &str) -> Option<Msg> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "stop" => Some(Msg::StopClicked),
        "d" | "download" => Some(Msg::DownloadLogsClicked),
        _ => None,
    }
}

#[derive(Args, Debug)]
pub struct DailyPostArgs {
    /// Account id to post from (repeatable)
    #[arg(long = "account")]
    pub accounts: Vec<String>,
    /// Photo or video to post
    #[arg(long)]
    pub media: Option<PathBuf>,
    #[arg(long, default_value = "")]
    pub caption: String,
    /// Show the automation browser
    #[arg(long)]
    pub visual: bool,
}

impl DailyPostArgs {
    fn to_form(&self) -> DailyPostForm {
        DailyPostForm {
            account_ids: self.accounts.clone(),
            media_file: self.media.clone(),
            caption: self.caption.clone(),
            visual_mode: self.visual,
        }
    }
}

#[derive(Args, Debug)]
pub struct DmArgs {
    #[arg(long = "account")]
    pub accounts: Vec<String>,
    /// CSV or text file of target usernames
    #[arg(long = "targets")]
    pub target_file: Option<PathBuf>,
    #[arg(long = "prompt-file")]
    pub prompt_file: Option<PathBuf>,
    #[arg(long = "prompt", default_value = "")]
    pub custom_prompt: String,
    #[arg(long, default_value_t = 5)]
    pub dms_per_account: u32,
    #[arg(long)]
    pub visual: bool,
}

impl DmArgs {
    fn to_form(&self) -> DmAutomationForm {
        DmAutomationForm {
            account_ids: self.accounts.clone(),
            target_file: self.target_file.clone(),
            prompt_file: self.prompt_file.clone(),
            custom_prompt: self.custom_prompt.clone(),
            dms_per_account: self.dms_per_account,
            visual_mode: self.visual,
        }
    }
}

#[derive(Args, Debug)]
pub struct WarmupArgs {
    #[arg(long = "account")]
    pub accounts: Vec<String>,
    /// Minutes per session, lower bound
    #[arg(long)]
    pub duration_min: Option<u32>,
    /// Minutes per session, upper bound
    #[arg(long)]
    pub duration_max: Option<u32>,
    /// Seconds to wait between accounts
    #[arg(long)]
    pub scheduler_delay: Option<u32>,
    #[arg(long)]
    pub visual: bool,
    /// Skip reels (watching and liking)
    #[arg(long)]
    pub no_reels: bool,
    /// Skip liking feed posts
    #[arg(long)]
    pub no_likes: bool,
    /// Skip the explore page and random profile visits
    #[arg(long)]
    pub no_explore: bool,
}

impl WarmupArgs {
    fn to_form(&self) -> WarmupForm {
        let defaults = WarmupSettings::default();
        let settings = WarmupSettings {
            duration_min: self.duration_min.unwrap_or(defaults.duration_min),
            duration_max: self.duration_max.unwrap_or(defaults.duration_max),
            scheduler_delay: self.scheduler_delay.unwrap_or(defaults.scheduler_delay),
            visual_mode: self.visual,
            watch_reels: !self.no_reels,
            like_reels: !self.no_reels,
            like_posts: !self.no_likes,
            explore_page: !self.no_explore,
            random_visits: !self.no_explore,
            ..defaults
        };
        WarmupForm {
            account_ids: self.accounts.clone(),
            settings,
        }
    }
}
