use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    DailyPost,
    DmAutomation,
    Warmup,
}

impl JobKind {
    /// Wire name used by the backend in job records.
    pub fn slug(self) -> &'static str {
        match self {
            JobKind::DailyPost => "daily_post",
            JobKind::DmAutomation => "dm_automation",
            JobKind::Warmup => "warmup",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "daily_post" => Some(JobKind::DailyPost),
            "dm_automation" => Some(JobKind::DmAutomation),
            "warmup" => Some(JobKind::Warmup),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobKind::DailyPost => "daily post",
            JobKind::DmAutomation => "DM automation",
            JobKind::Warmup => "account warm-up",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPostForm {
    pub account_ids: Vec<String>,
    pub media_file: Option<PathBuf>,
    pub caption: String,
    pub visual_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmAutomationForm {
    pub account_ids: Vec<String>,
    pub target_file: Option<PathBuf>,
    pub prompt_file: Option<PathBuf>,
    pub custom_prompt: String,
    pub dms_per_account: u32,
    pub visual_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupForm {
    pub account_ids: Vec<String>,
    pub settings: WarmupSettings,
}

/// Warm-up tuning knobs. Durations are minutes, delays seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupSettings {
    pub duration_min: u32,
    pub duration_max: u32,
    pub scheduler_delay: u32,
    pub visual_mode: bool,
    pub feed_scroll: bool,
    pub watch_reels: bool,
    pub like_reels: bool,
    pub like_posts: bool,
    pub explore_page: bool,
    pub random_visits: bool,
    pub activity_delay_min: u32,
    pub activity_delay_max: u32,
    pub scroll_attempts_min: u32,
    pub scroll_attempts_max: u32,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            duration_min: 10,
            duration_max: 400,
            scheduler_delay: 0,
            visual_mode: false,
            feed_scroll: true,
            watch_reels: true,
            like_reels: true,
            like_posts: true,
            explore_page: true,
            random_visits: true,
            activity_delay_min: 3,
            activity_delay_max: 7,
            scroll_attempts_min: 5,
            scroll_attempts_max: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchForm {
    DailyPost(DailyPostForm),
    DmAutomation(DmAutomationForm),
    Warmup(WarmupForm),
}

/// One field of a multipart job-start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

impl FormPart {
    fn text(name: &str, value: impl ToString) -> Self {
        FormPart::Text {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn file(name: &str, path: &PathBuf) -> Self {
        FormPart::File {
            name: name.to_string(),
            path: path.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// A validated launch, ready to be sent as one multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub kind: JobKind,
    pub parts: Vec<FormPart>,
}

impl JobSubmission {
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select at least one account")]
    NoAccounts,
    #[error("{field} is required")]
    MissingFile { field: &'static str },
    #[error("{field} must not be empty")]
    BlankField { field: &'static str },
    #[error("provide a prompt file or a custom prompt")]
    MissingPrompt,
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    InvalidRange {
        field: &'static str,
        min: u32,
        max: u32,
    },
}

impl LaunchForm {
    pub fn kind(&self) -> JobKind {
        match self {
            LaunchForm::DailyPost(_) => JobKind::DailyPost,
            LaunchForm::DmAutomation(_) => JobKind::DmAutomation,
            LaunchForm::Warmup(_) => JobKind::Warmup,
        }
    }

    /// Check required inputs and package them into a submission.
    pub fn validate(&self) -> Result<JobSubmission, ValidationError> {
        let parts = match self {
            LaunchForm::DailyPost(form) => daily_post_parts(form)?,
            LaunchForm::DmAutomation(form) => dm_automation_parts(form)?,
            LaunchForm::Warmup(form) => warmup_parts(form)?,
        };
        Ok(JobSubmission {
            kind: self.kind(),
            parts,
        })
    }
}

fn daily_post_parts(form: &DailyPostForm) -> Result<Vec<FormPart>, ValidationError> {
    let accounts = account_ids_field(&form.account_ids)?;
    let media = form
        .media_file
        .as_ref()
        .ok_or(ValidationError::MissingFile {
            field: "media file",
        })?;
    if form.caption.trim().is_empty() {
        return Err(ValidationError::BlankField { field: "caption" });
    }
    Ok(vec![
        accounts,
        FormPart::file("media_file", media),
        FormPart::text("caption", &form.caption),
        FormPart::text("visual_mode", form.visual_mode),
    ])
}

fn dm_automation_parts(form: &DmAutomationForm) -> Result<Vec<FormPart>, ValidationError> {
    let accounts = account_ids_field(&form.account_ids)?;
    let target = form
        .target_file
        .as_ref()
        .ok_or(ValidationError::MissingFile {
            field: "target file",
        })?;
    if form.prompt_file.is_none() && form.custom_prompt.trim().is_empty() {
        return Err(ValidationError::MissingPrompt);
    }
    if form.dms_per_account == 0 {
        return Err(ValidationError::ZeroCount {
            field: "DMs per account",
        });
    }

    let mut parts = vec![accounts, FormPart::file("target_file", target)];
    if let Some(prompt) = &form.prompt_file {
        parts.push(FormPart::file("dm_prompt_file", prompt));
    }
    parts.push(FormPart::text("custom_prompt", form.custom_prompt.trim()));
    parts.push(FormPart::text("dms_per_account", form.dms_per_account));
    parts.push(FormPart::text("visual_mode", form.visual_mode));
    Ok(parts)
}

fn warmup_parts(form: &WarmupForm) -> Result<Vec<FormPart>, ValidationError> {
    let accounts = account_ids_field(&form.account_ids)?;
    let s = &form.settings;
    check_range("warm-up duration", s.duration_min, s.duration_max)?;
    check_range("activity delay", s.activity_delay_min, s.activity_delay_max)?;
    check_range("scroll attempts", s.scroll_attempts_min, s.scroll_attempts_max)?;

    Ok(vec![
        accounts,
        FormPart::text("warmup_duration_min", s.duration_min),
        FormPart::text("warmup_duration_max", s.duration_max),
        FormPart::text("scheduler_delay", s.scheduler_delay),
        FormPart::text("visual_mode", s.visual_mode),
        FormPart::text("feed_scroll", s.feed_scroll),
        FormPart::text("watch_reels", s.watch_reels),
        FormPart::text("like_reels", s.like_reels),
        FormPart::text("like_posts", s.like_posts),
        FormPart::text("explore_page", s.explore_page),
        FormPart::text("random_visits", s.random_visits),
        FormPart::text("activity_delay_min", s.activity_delay_min),
        FormPart::text("activity_delay_max", s.activity_delay_max),
        FormPart::text("scroll_attempts_min", s.scroll_attempts_min),
        FormPart::text("scroll_attempts_max", s.scroll_attempts_max),
    ])
}

/// The backend expects the selected ids as a JSON array in a single text field.
fn account_ids_field(account_ids: &[String]) -> Result<FormPart, ValidationError> {
    let ids: Vec<&str> = account_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(ValidationError::NoAccounts);
    }
    let encoded = serde_json::Value::from(ids).to_string();
    Ok(FormPart::text("account_ids", encoded))
}

fn check_range(field: &'static str, min: u32, max: u32) -> Result<(), ValidationError> {
    if min > max {
        return Err(ValidationError::InvalidRange { field, min, max });
    }
    Ok(())
}
