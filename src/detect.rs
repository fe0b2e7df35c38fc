//! Heuristic task extraction from free text.
//!
//! A best-effort keyword/regex scan — no parsing grammar, no scoring model.
//! Given a free-text string and the known people, it proposes whether the
//! text describes a task and a partial task skeleton: a truncated title, a
//! detected-but-unparsed deadline flag, a detected assignee, and a rough
//! priority. Read-only; nothing is ever persisted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{Person, Priority};

/// Maximum proposed title length, in characters.
const TITLE_MAX_CHARS: usize = 100;

/// Trigger words meaning "this is probably a task", Hebrew and English.
const TASK_KEYWORDS: &[&str] = &[
    "תזכיר",
    "תזכורת",
    "משימה",
    "צריך",
    "חייב",
    "לעשות",
    "remind",
    "reminder",
    "task",
    "need to",
    "must",
    "todo",
];

const URGENT_MARKERS: &[&str] = &["דחוף", "חשוב", "urgent", "important"];
const NOT_URGENT_MARKERS: &[&str] = &["לא דחוף", "not urgent"];

/// Date-ish patterns: an explicit day/month numeral form plus literal
/// "by tomorrow / today / this evening" phrases. A match only raises the
/// placeholder flag — no concrete date is ever computed.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"עד (\d{1,2})/(\d{1,2})",
        r"עד מחר",
        r"עד היום",
        r"עד הערב",
        r"(?i)by tomorrow",
        r"(?i)by today",
        r"(?i)by this evening",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("fixed date pattern"))
    .collect()
});

/// The proposed task skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub is_task: bool,
    /// The text truncated to 100 characters; empty when `is_task` is false.
    pub title: String,
    /// Placeholder signal: a date-ish pattern matched, but no date was
    /// parsed. Callers must not treat this as a usable timestamp.
    pub deadline_detected: bool,
    pub assigned_to: Option<i64>,
    pub priority: Priority,
}

/// Scan `text` for task likelihood, a deadline hint, an assignee, and a
/// priority. Assignee matching is a verbatim substring scan over the known
/// people in declaration order; the last match wins.
pub fn detect_task(text: &str, people: &[Person]) -> Detection {
    let lower = text.to_lowercase();

    let is_task = TASK_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let title = if is_task {
        text.chars().take(TITLE_MAX_CHARS).collect()
    } else {
        String::new()
    };

    let deadline_detected = DATE_PATTERNS.iter().any(|re| re.is_match(text));

    let mut assigned_to = None;
    for person in people {
        if !person.name.is_empty() && text.contains(&person.name) {
            assigned_to = Some(person.id);
        }
    }

    let priority = if URGENT_MARKERS.iter().any(|m| lower.contains(m)) {
        Priority::Urgent
    } else if NOT_URGENT_MARKERS.iter().any(|m| lower.contains(m)) {
        Priority::Low
    } else {
        Priority::Medium
    };

    Detection {
        is_task,
        title,
        deadline_detected,
        assigned_to,
        priority,
    }
}
