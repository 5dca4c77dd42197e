use anyhow::Result;

use quill::config::QuillConfig;

use super::{preview, Session};

pub async fn analyze(config: &QuillConfig) -> Result<()> {
    let mut session = Session::open(config)?;
    if let Some(text) = analyze_week(&mut session).await? {
        preview(&text);
        println!("Saved under {}", session.analyzer.output_dir().display());
    }
    Ok(())
}

/// Deep analysis of the current week.
pub async fn analyze_week(session: &mut Session) -> Result<Option<String>> {
    let week = session.current_week();
    let entries = session.entries_in(&week);
    let summaries = session.summaries_before(&week)?;
    session
        .analyzer
        .weekly_analysis(&entries, &summaries, Some(session.entries.as_slice()))
        .await
}
