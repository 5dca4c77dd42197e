//! The three report kinds and the memory pipeline they share.
//!
//! Weekly summaries are diary-only. Daily evaluations and the week-end
//! analysis see the full context (profile, past summaries, this week's diary,
//! open todos), and their replies may carry a memory update block, which is
//! cut from the narrative and applied to the profile.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::context;
use crate::diary::DiaryEntry;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest};
use crate::memory::instruction;
use crate::memory::Memory;
use crate::period::{Week, WeekEntries};
use crate::prompts;

pub struct Analyzer {
    client: Arc<dyn ChatCompletion>,
    memory: Option<Memory>,
    output_dir: PathBuf,
    summary_temperature: f32,
    evaluation_temperature: f32,
    max_tokens: u32,
    today: NaiveDate,
}

impl Analyzer {
    pub fn new(
        client: Arc<dyn ChatCompletion>,
        memory: Option<Memory>,
        llm: &LlmConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            memory,
            output_dir: output_dir.into(),
            summary_temperature: llm.summary_temperature,
            evaluation_temperature: llm.evaluation_temperature,
            max_tokens: llm.max_tokens,
            today: Local::now().date_naive(),
        }
    }

    /// Age open todos against `today` instead of the current date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Summarize one week. `None` for a week without entries or a skipped request.
    pub async fn weekly_summary(&self, week: &WeekEntries) -> Result<Option<String>> {
        if week.entries.is_empty() {
            warn!(week = %week.week, "week has no entries, nothing to summarize");
            return Ok(None);
        }
        let w = &week.week;
        let label = format!("{} W{:02}", w.year, w.week);
        let diary = context::render_diaries(&week.entries, &format!("Diary for {label}"), true);
        let request = CompletionRequest::new(
            format!("weekly summary {label}"),
            vec![
                ChatMessage::system(prompts::weekly_summary_system()),
                ChatMessage::user(prompts::weekly_summary_user(
                    &w.start.format("%Y-%m-%d").to_string(),
                    &w.end.format("%Y-%m-%d").to_string(),
                    week.entries.len(),
                    &diary,
                )),
            ],
        )
        .temperature(self.summary_temperature)
        .max_tokens(self.max_tokens);

        Ok(self.client.complete(&request).await?)
    }

    /// Evaluate `entry` against its week and the summaries before it.
    ///
    /// `open_items_from` is the wider set of entries the todo digest is built
    /// from; `None` uses `week_entries`.
    pub async fn daily_evaluation(
        &mut self,
        entry: &DiaryEntry,
        week_entries: &[DiaryEntry],
        summaries: &[(Week, String)],
        open_items_from: Option<&[DiaryEntry]>,
    ) -> Result<Option<String>> {
        info!(date = %entry.date, "generating daily evaluation");
        let date = entry.date.format("%Y-%m-%d").to_string();
        let todos = context::render_open_items(open_items_from.unwrap_or(week_entries), self.today);
        let diary = context::render_diaries(week_entries, "This week's diary (up to today)", false);
        let request = CompletionRequest::new(
            format!("daily evaluation {date}"),
            vec![
                ChatMessage::system(prompts::daily_evaluation_system(&self.profile())),
                ChatMessage::user(prompts::daily_evaluation_user(
                    &date,
                    &context::render_summaries(summaries),
                    &todos,
                    &diary,
                )),
            ],
        )
        .temperature(self.evaluation_temperature)
        .max_tokens(self.max_tokens);

        let reply = self.client.complete(&request).await?;
        self.process_reply(reply).await
    }

    /// Analyse a finished week and save the result to `output_dir`.
    pub async fn weekly_analysis(
        &mut self,
        entries: &[DiaryEntry],
        summaries: &[(Week, String)],
        open_items_from: Option<&[DiaryEntry]>,
    ) -> Result<Option<String>> {
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
            warn!("no entries this week, skipping analysis");
            return Ok(None);
        };
        info!(summaries = summaries.len(), entries = entries.len(), "generating weekly analysis");
        let todos = context::render_open_items(open_items_from.unwrap_or(entries), self.today);
        let end = last.date.format("%Y-%m-%d").to_string();
        let request = CompletionRequest::new(
            format!("weekly analysis {end}"),
            vec![
                ChatMessage::system(prompts::weekly_analysis_system(&self.profile())),
                ChatMessage::user(prompts::weekly_analysis_user(
                    &end,
                    &context::render_summaries(summaries),
                    &todos,
                    &context::render_diaries(entries, "This week's diary", false),
                )),
            ],
        )
        .temperature(self.evaluation_temperature)
        .max_tokens(self.max_tokens);

        let reply = self.client.complete(&request).await?;
        let Some(narrative) = self.process_reply(reply).await? else {
            return Ok(None);
        };
        self.save_analysis(&narrative, first.date, last.date, entries.len())?;
        Ok(Some(narrative))
    }

    fn profile(&self) -> String {
        context::render_profile(self.memory.as_ref().map(|m| &m.store))
    }

    /// Cut the memory update block out of `reply` and apply it.
    async fn process_reply(&mut self, reply: Option<String>) -> Result<Option<String>> {
        let Some(reply) = reply else {
            return Ok(None);
        };
        let extracted = instruction::extract(&reply);
        match (extracted.update, self.memory.as_mut()) {
            (Some(update), Some(memory)) if !update.is_empty() => {
                memory.apply(&update).await?;
            }
            (Some(_), None) => debug!("reply carries a memory update but no profile is attached"),
            _ => {}
        }
        Ok(Some(extracted.narrative))
    }

    fn save_analysis(
        &self,
        analysis: &str,
        start: NaiveDate,
        end: NaiveDate,
        entries: usize,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        let now = Local::now();
        let name = format!(
            "analysis_{}-{}_{}.md",
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
            now.format("%Y-%m-%d_%H%M%S")
        );
        let header = format!(
            "# Diary Analysis\n**Generated**: {}\n**Range**: {} to {}\n**Entries**: {entries}\n\n---\n\n",
            now.format("%Y-%m-%d %H:%M:%S"),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        );
        let path = self.output_dir.join(name);
        std::fs::write(&path, header + analysis)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "analysis saved");
        Ok(path)
    }
}
