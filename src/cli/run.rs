use anyhow::Result;
use chrono::{Datelike, Weekday};
use tracing::info;

use quill::config::QuillConfig;
use quill::diary::DiaryEntry;

use super::{analyze, evaluate, preview, summarize, Session};

/// Summaries, then evaluations of this week's new entries, then the weekly
/// analysis on Sunday (or when `force_analysis` is set).
pub async fn run(config: &QuillConfig, force_analysis: bool) -> Result<()> {
    let mut session = Session::open(config)?;
    summarize::generate_missing(&session).await?;

    let week = session.current_week();
    let pending: Vec<DiaryEntry> = session
        .entries_in(&week)
        .into_iter()
        .filter(|e| !e.has_ai_comment())
        .collect();
    info!(week = %week, pending = pending.len(), "entries awaiting evaluation");

    let mut last = None;
    for entry in &pending {
        if let Some(text) = evaluate::evaluate_entry(&mut session, entry).await? {
            last = Some(text);
        }
    }

    if force_analysis || session.today.weekday() == Weekday::Sun {
        if let Some(text) = analyze::analyze_week(&mut session).await? {
            last = Some(text);
        }
    }

    match last {
        Some(text) => preview(&text),
        None => println!("Nothing new to report."),
    }
    Ok(())
}
