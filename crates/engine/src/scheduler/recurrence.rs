//! Recurrence resolution: `later` phrases, cron expressions and fixed intervals.
//!
//! Phrases are calendar-aligned, so `every 5 minutes` fires at :00, :05, :10
//! and so on rather than five minutes after installation. They are translated
//! to cron expressions and share the cron path. Fixed `interval` triggers run
//! every N seconds counted from installation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Resolved, schedulable form of a watcher trigger.
#[derive(Debug, Clone)]
pub enum Recurrence {
    /// Every N seconds from installation.
    Every(Duration),
    /// Calendar-aligned cron schedule.
    Cron(Schedule),
}

/// Reasons a `later` phrase cannot be scheduled.
#[derive(Debug, thiserror::Error)]
pub enum RecurrenceError {
    #[error("empty recurrence phrase")]
    Empty,

    #[error("invalid cron expression '{expression}': {message}")]
    InvalidCron { expression: String, message: String },

    #[error("unrecognized recurrence phrase '{0}'")]
    UnknownPhrase(String),
}

impl Recurrence {
    /// Parse a `later` phrase (`every 5 minutes`, `at 10:15`, ...) or a
    /// 5/6/7-field cron expression.
    pub fn from_phrase(phrase: &str) -> Result<Self, RecurrenceError> {
        let trimmed = phrase.trim();
        if trimmed.is_empty() {
            return Err(RecurrenceError::Empty);
        }
        let expression = match phrase_to_cron(trimmed) {
            Some(expr) => expr,
            None if looks_like_cron(trimmed) => normalize_cron(trimmed),
            None => return Err(RecurrenceError::UnknownPhrase(trimmed.to_string())),
        };
        Schedule::from_str(&expression)
            .map(Recurrence::Cron)
            .map_err(|e| RecurrenceError::InvalidCron {
                expression,
                message: e.to_string(),
            })
    }

    /// Fixed interval of `secs` seconds; zero is not schedulable.
    pub fn every_seconds(secs: u64) -> Option<Self> {
        (secs > 0).then(|| Recurrence::Every(Duration::from_secs(secs)))
    }

    /// The next tick strictly after `after`, for cron recurrences.
    pub fn next_tick(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::Every(_) => None,
            Recurrence::Cron(schedule) => schedule.after(&after).next(),
        }
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires `sec min hour day-of-month month day-of-week [year]`;
/// watcher definitions commonly carry the classic 5-field form.
pub(crate) fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn looks_like_cron(text: &str) -> bool {
    let fields = text.split_whitespace().count();
    (5..=7).contains(&fields)
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || "*/,-?#".contains(c))
}

/// Translate a recurrence phrase to a 6-field cron expression.
pub(crate) fn phrase_to_cron(phrase: &str) -> Option<String> {
    let lower = phrase.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    match words.as_slice() {
        ["every", "weekday"] => Some("0 0 0 * * Mon-Fri".to_string()),
        ["every", "weekend"] => Some("0 0 0 * * Sat,Sun".to_string()),
        ["every", unit] => every(1, unit),
        ["every", n, unit] => every(n.parse().ok()?, unit),
        ["at", time @ ..] | ["every", "day", "at", time @ ..] => {
            let (hour, minute) = parse_time(&time.concat())?;
            Some(format!("0 {minute} {hour} * * *"))
        }
        _ => None,
    }
}

fn every(n: u32, unit: &str) -> Option<String> {
    let (max, template): (u32, fn(&str) -> String) = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => (59, |step| format!("{step} * * * * *")),
        "m" | "min" | "mins" | "minute" | "minutes" => (59, |step| format!("0 {step} * * * *")),
        "h" | "hr" | "hrs" | "hour" | "hours" => (23, |step| format!("0 0 {step} * * *")),
        "d" | "day" | "days" => (31, |step| format!("0 0 0 {step} * *")),
        _ => return None,
    };
    if n == 0 || n > max {
        return None;
    }
    let step = if n == 1 { "*".to_string() } else { format!("*/{n}") };
    Some(template(&step))
}

/// Parse `10:15`, `10:15am`, `7pm` into (hour, minute).
fn parse_time(text: &str) -> Option<(u32, u32)> {
    let (clock, offset) = if let Some(t) = text.strip_suffix("am") {
        (t, Some(0))
    } else if let Some(t) = text.strip_suffix("pm") {
        (t, Some(12))
    } else {
        (text, None)
    };

    let (h, m) = match clock.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (clock.parse::<u32>().ok()?, 0),
    };

    let hour = match offset {
        Some(add) if (1..=12).contains(&h) => h % 12 + add,
        Some(_) => return None,
        None => h,
    };
    (hour < 24 && m < 60).then_some((hour, m))
}
