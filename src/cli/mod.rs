pub mod analyze;
pub mod evaluate;
pub mod memory;
pub mod run;
pub mod summarize;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use std::sync::Arc;

use quill::analysis::Analyzer;
use quill::config::QuillConfig;
use quill::diary::{DiaryEntry, DiaryReader};
use quill::llm::{ChatCompletion, LlmClient};
use quill::memory::compactor::Compactor;
use quill::memory::store::MemoryStore;
use quill::memory::Memory;
use quill::operator::{Operator, TerminalOperator};
use quill::period::{SummaryArchive, Week};

/// Characters of a report shown in the terminal.
const PREVIEW_CHARS: usize = 500;

/// Everything a report command needs, wired from the config.
pub struct Session {
    pub entries: Vec<DiaryEntry>,
    pub archive: SummaryArchive,
    pub analyzer: Analyzer,
    pub today: NaiveDate,
}

impl Session {
    pub fn open(config: &QuillConfig) -> Result<Self> {
        config.validate()?;
        let operator: Arc<dyn Operator> = Arc::new(TerminalOperator);
        let client = build_client(config, operator.clone())?;
        let memory = open_memory(config, client.clone(), operator);
        let today = Local::now().date_naive();

        let entries = DiaryReader::new(config.diary_dirs()).read_all();
        if entries.is_empty() {
            bail!("no diary entries found in {:?}", config.paths.diary_dirs);
        }

        Ok(Self {
            entries,
            archive: SummaryArchive::new(config.summary_dir()),
            analyzer: Analyzer::new(client, Some(memory), &config.llm, config.output_dir())
                .with_today(today),
            today,
        })
    }

    pub fn current_week(&self) -> Week {
        Week::of(self.today)
    }

    pub fn entries_in(&self, week: &Week) -> Vec<DiaryEntry> {
        self.entries
            .iter()
            .filter(|e| week.contains(e.date))
            .cloned()
            .collect()
    }

    /// Stored summaries of weeks that started before `week`.
    pub fn summaries_before(&self, week: &Week) -> Result<Vec<(Week, String)>> {
        Ok(self
            .archive
            .load_all()?
            .into_iter()
            .filter(|(w, _)| w.start < week.start)
            .collect())
    }
}

pub fn build_client(
    config: &QuillConfig,
    operator: Arc<dyn Operator>,
) -> Result<Arc<dyn ChatCompletion>> {
    let client: Arc<dyn ChatCompletion> =
        Arc::new(LlmClient::new(&config.llm, &config.log_dir(), operator)?);
    Ok(client)
}

/// The profile store and its compactor. Backups go to the log directory.
pub fn open_memory(
    config: &QuillConfig,
    client: Arc<dyn ChatCompletion>,
    operator: Arc<dyn Operator>,
) -> Memory {
    let store = MemoryStore::open(config.profile_path());
    let compactor = Compactor::new(client, operator, &config.memory, &config.llm, config.log_dir());
    Memory::new(store, compactor)
}

/// Print the start of a report.
pub fn preview(text: &str) {
    println!("{}", "-".repeat(60));
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        println!("{head}...");
        println!("\n... (truncated, see the saved file for the full text)");
    } else {
        println!("{text}");
    }
    println!("{}", "-".repeat(60));
}
