use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use quill::config::QuillConfig;
use quill::diary::{append_ai_comment, DiaryEntry};
use quill::period::Week;

use super::{preview, Session};

pub async fn evaluate(config: &QuillConfig, date: Option<NaiveDate>) -> Result<()> {
    let mut session = Session::open(config)?;
    let entry = match date {
        Some(date) => session.entries.iter().find(|e| e.date == date),
        None => session.entries.last(),
    }
    .cloned()
    .with_context(|| {
        let wanted = date.map_or("any date".to_string(), |d| d.to_string());
        format!("no diary entry for {wanted}")
    })?;

    if entry.has_ai_comment() {
        warn!(date = %entry.date, "entry already has an AI comment, skipping");
        return Ok(());
    }
    if let Some(text) = evaluate_entry(&mut session, &entry).await? {
        preview(&text);
    }
    Ok(())
}

/// Evaluate one entry against the days before it in its week and append the
/// result to the entry file.
pub async fn evaluate_entry(session: &mut Session, entry: &DiaryEntry) -> Result<Option<String>> {
    let week = Week::of(entry.date);
    let week_entries: Vec<DiaryEntry> = session
        .entries_in(&week)
        .into_iter()
        .filter(|e| e.date <= entry.date)
        .collect();
    let summaries = session.summaries_before(&week)?;

    let Some(text) = session
        .analyzer
        .daily_evaluation(entry, &week_entries, &summaries, Some(session.entries.as_slice()))
        .await?
    else {
        warn!(date = %entry.date, "evaluation skipped");
        return Ok(None);
    };
    append_ai_comment(&entry.path, &text)?;
    info!(date = %entry.date, "evaluation written");
    Ok(Some(text))
}
