//! CAPTCHA/2FA detection over job log snapshots.
//!
//! The remote job pauses itself when an account needs manual verification;
//! the scanner only has to notice the log line and tell the user once.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexSet};

use crate::JobId;

static INDICATORS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)captcha",
        r"(?i)\b2fa\b",
        r"(?i)two[- ]factor",
        r"(?i)verification code",
        r"(?i)requires verification",
        r"(?i)verification required",
        r"(?i)challenge required",
    ])
    .expect("valid indicator patterns")
});

/// Benign phrases the automation handles on its own.
static EXCLUSIONS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)save your login info",
        r"(?i)accounts/onetap",
        r"(?i)not now",
    ])
    .expect("valid exclusion patterns")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([^\]]*)\]").expect("valid bracket pattern"));

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").expect("valid timestamp pattern")
});

const LOG_LEVELS: &[&str] = &[
    "TRACE", "DEBUG", "INFO", "SUCCESS", "WARNING", "WARN", "ERROR", "CRITICAL",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptKind {
    /// An account hit a CAPTCHA or 2FA wall.
    Captcha2fa { account: Option<String> },
    /// The browser window of the job was closed.
    BrowserClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptEvent {
    pub job_id: JobId,
    pub kind: InterruptKind,
    pub at: DateTime<Utc>,
}

impl InterruptEvent {
    pub fn browser_closed(job_id: JobId, at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            kind: InterruptKind::BrowserClosed,
            at,
        }
    }
}

/// Remembers which lines were already reported so a line fires once,
/// no matter how many later snapshots repeat it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogScanner {
    reported: HashSet<String>,
}

impl LogScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&mut self, job_id: &JobId, lines: &[String], at: DateTime<Utc>) -> Vec<InterruptEvent> {
        let mut events = Vec::new();
        for line in lines {
            if !is_interrupt_line(line) || self.reported.contains(line) {
                continue;
            }
            self.reported.insert(line.clone());
            events.push(InterruptEvent {
                job_id: job_id.clone(),
                kind: InterruptKind::Captcha2fa {
                    account: account_from_line(line),
                },
                at,
            });
        }
        events
    }

    pub fn reported_count(&self) -> usize {
        self.reported.len()
    }

    pub fn reset(&mut self) {
        self.reported.clear();
    }
}

/// True when `line` signals a CAPTCHA/2FA wall and is not a known benign dialog.
pub fn is_interrupt_line(line: &str) -> bool {
    INDICATORS.is_match(line) && !EXCLUSIONS.is_match(line)
}

/// First bracketed prefix that is neither a timestamp nor a log level.
pub fn account_from_line(line: &str) -> Option<String> {
    let mut rest = line;
    while let Some(caps) = BRACKETED.captures(rest) {
        let whole = caps.get(0)?;
        let inner = caps.get(1)?.as_str().trim();
        rest = &rest[whole.end()..];
        if inner.is_empty() || TIMESTAMP.is_match(inner) || is_log_level(inner) {
            continue;
        }
        return Some(inner.to_string());
    }
    None
}

fn is_log_level(token: &str) -> bool {
    LOG_LEVELS.iter().any(|level| level.eq_ignore_ascii_case(token))
}
