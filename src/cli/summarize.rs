use anyhow::{bail, Result};
use tracing::info;

use quill::config::QuillConfig;
use quill::period::group_by_week;

use super::Session;

pub async fn summarize(config: &QuillConfig) -> Result<()> {
    let session = Session::open(config)?;
    generate_missing(&session).await
}

/// Summarize every finished week that has entries but no summary yet.
/// Stops at the first week that produces nothing.
pub async fn generate_missing(session: &Session) -> Result<()> {
    let weeks = group_by_week(&session.entries);
    let pending = session.archive.weeks_needing_summary(&weeks, session.today);
    if pending.is_empty() {
        info!("every finished week already has a summary");
        return Ok(());
    }

    let total = pending.len();
    info!(weeks = total, "generating missing weekly summaries");
    for (i, week) in pending.into_iter().enumerate() {
        info!(week = %week.week, progress = %format!("{}/{total}", i + 1), "summarizing");
        let Some(summary) = session.analyzer.weekly_summary(week).await? else {
            bail!("no summary produced for {}, stopping", week.week);
        };
        session.archive.save(week, &summary)?;
    }
    println!("Generated {total} weekly summaries in {}", session.archive.dir().display());
    Ok(())
}
