//! Renders the layered prompt context: profile, past summaries, diary and
//! open items. Every function returns an empty string for empty input.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use crate::diary::DiaryEntry;
use crate::memory::store::MemoryStore;
use crate::period::Week;

const DIVIDER_WIDTH: usize = 50;

/// Completed items older than this are left out of the digest.
const COMPLETED_ITEM_MAX_AGE_DAYS: i64 = 7;

const OPEN_ITEMS_LEGEND: &str = "Only open todos and todos completed within the last week are listed.
### Todo markers
- Level-3 heading: date the todo was written
- Priority: 🔺 (highest) > ⏫ (high) > 🔼 (medium) > (none) (normal) > 🔽 (low) > ⏬ (lowest)
- 📅: due date
- ✅: completion date
- ❌: dropped or failed date";

fn divider() -> String {
    "=".repeat(DIVIDER_WIDTH)
}

/// The user profile section; empty when no store is attached.
pub fn render_profile(store: Option<&MemoryStore>) -> String {
    let Some(store) = store else {
        return String::new();
    };
    let body = if store.is_empty() {
        "No personal information recorded yet.".to_string()
    } else {
        store.render_bullets()
    };
    format!("\n## User profile (long-term memory)\n{body}\n")
}

/// Prior weekly summaries, in the order given.
pub fn render_summaries(summaries: &[(Week, String)]) -> String {
    if summaries.is_empty() {
        return String::new();
    }
    let mut parts = vec!["\n## Previous weekly summaries\n".to_string()];
    for (week, summary) in summaries {
        parts.push(format!(
            "### {} W{:02} ({} to {})",
            week.year,
            week.week,
            week.start.format("%m-%d"),
            week.end.format("%m-%d")
        ));
        parts.push(String::new());
        parts.push(summary.clone());
        parts.push(String::new());
        parts.push(divider());
        parts.push(String::new());
    }
    parts.join("\n")
}

/// Each entry's rendered text under `title`, divider-separated.
pub fn render_diaries(entries: &[DiaryEntry], title: &str, include_todos: bool) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut parts = vec![format!("\n## {title}\n")];
    for entry in entries {
        parts.push(entry.render(include_todos));
        parts.push(String::new());
        parts.push(divider());
        parts.push(String::new());
    }
    parts.join("\n")
}

fn checkbox() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\s*[xX]?\s*\]").expect("checkbox pattern is valid"))
}

fn completed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\s*[xX]\s*\]").expect("completed pattern is valid"))
}

fn completion_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"✅\s*(\d{4}-\d{2}-\d{2})").expect("completion date pattern is valid")
    })
}

/// Whether a todo line belongs in the open-items digest as of `today`.
///
/// Lines with nothing after the checkbox are dropped. Completed lines need a
/// `✅ YYYY-MM-DD` marker no more than a week old; open lines always stay.
pub fn is_open_item(todo: &str, today: NaiveDate) -> bool {
    if checkbox().replace(todo, "").trim().is_empty() {
        return false;
    }
    if !completed().is_match(todo) {
        return true;
    }
    completion_date()
        .captures(todo)
        .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
        .is_some_and(|done| (today - done).num_days() <= COMPLETED_ITEM_MAX_AGE_DAYS)
}

/// Open and recently completed todos, grouped under the date they were written.
pub fn render_open_items(entries: &[DiaryEntry], today: NaiveDate) -> String {
    let mut parts = Vec::new();
    for entry in entries {
        let live: Vec<&String> = entry.todos.iter().filter(|t| is_open_item(t, today)).collect();
        if live.is_empty() {
            continue;
        }
        parts.push(format!("### {}", entry.date.format("%Y-%m-%d")));
        parts.extend(live.into_iter().map(|t| format!("- {t}")));
        parts.push(String::new());
    }
    if parts.is_empty() {
        return String::new();
    }
    format!("\n## 📋 Open todos\n{OPEN_ITEMS_LEGEND}\n\n{}", parts.join("\n"))
}
