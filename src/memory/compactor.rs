//! Size policy for the fact store.
//!
//! After every change the store is checked against the high-water mark. Past
//! it, the store is snapshotted and the model is asked to compact it (merge and
//! de-duplicate without losing facts). If it is still above the ceiling, the
//! model is asked to prune low-value facts. If that is still not enough, a
//! person edits the file by hand. Any model result shorter than the floor is
//! rejected, so automation can never wipe most of the profile.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::store::{write_facts, MemoryStore};
use crate::config::{LlmConfig, MemoryConfig};
use crate::error::Stopped;
use crate::llm::{ChatCompletion, ChatMessage, CompletionRequest};
use crate::operator::{CompactionChoice, Operator};
use crate::prompts;

/// Average fact length assumed when the store is empty.
const FALLBACK_FACT_CHARS: f64 = 30.0;

/// What one pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompactionReport {
    pub chars_before: usize,
    pub chars_after: usize,
    pub rounds_attempted: u32,
    pub compacted: bool,
    pub pruned: bool,
    pub manual_edit: bool,
    pub backup: Option<PathBuf>,
}

pub struct Compactor {
    client: Arc<dyn ChatCompletion>,
    operator: Arc<dyn Operator>,
    policy: MemoryConfig,
    backup_dir: PathBuf,
    temperature: f32,
    max_tokens: u32,
}

impl Compactor {
    pub fn new(
        client: Arc<dyn ChatCompletion>,
        operator: Arc<dyn Operator>,
        policy: &MemoryConfig,
        llm: &LlmConfig,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            operator,
            policy: policy.clone(),
            backup_dir: backup_dir.into(),
            temperature: llm.default_temperature,
            max_tokens: llm.max_tokens,
        }
    }

    /// Compact if the store is above the high-water mark; otherwise do nothing.
    pub async fn enforce(&self, store: &mut MemoryStore) -> Result<CompactionReport> {
        let chars = store.char_len();
        if !self.policy.enabled || chars <= self.policy.high_water_chars {
            return Ok(CompactionReport {
                chars_before: chars,
                chars_after: chars,
                ..Default::default()
            });
        }
        warn!(
            chars,
            high_water = self.policy.high_water_chars,
            "memory above high-water mark, compacting"
        );
        self.run(store).await
    }

    /// Run a full pass regardless of size.
    pub async fn compact_now(&self, store: &mut MemoryStore) -> Result<CompactionReport> {
        self.run(store).await
    }

    async fn run(&self, store: &mut MemoryStore) -> Result<CompactionReport> {
        let mut report = CompactionReport {
            chars_before: store.char_len(),
            ..Default::default()
        };

        match self.backup(store) {
            Ok(path) => {
                info!(path = %path.display(), "memory backed up");
                report.backup = Some(path);
            }
            Err(e) => warn!(error = %e, "failed to back up memory"),
        }

        let rounds = self.policy.compaction_rounds.max(1);
        'compaction: loop {
            for round in 1..=rounds {
                report.rounds_attempted += 1;
                info!(round, of = rounds, "compacting memory");
                let Some(facts) = self.request_facts(self.compaction_request(store)?).await? else {
                    continue;
                };
                if self.acceptable(&facts) {
                    store.replace_all(facts)?;
                    report.compacted = true;
                    info!(chars = store.char_len(), "memory compacted");
                    break 'compaction;
                }
            }

            warn!(rounds, "every compaction round failed");
            match self.operator.on_compaction_failure() {
                CompactionChoice::Retry => continue,
                CompactionChoice::Prune => break,
                CompactionChoice::ManualEdit => {
                    self.manual_edit(store, &mut report);
                    return Ok(report);
                }
                CompactionChoice::Abort => return Err(Stopped.into()),
            }
        }

        if store.char_len() > self.policy.ceiling_chars {
            self.prune(store, &mut report).await?;
        }
        if store.char_len() > self.policy.ceiling_chars {
            warn!(
                chars = store.char_len(),
                ceiling = self.policy.ceiling_chars,
                "memory still too large, manual edit required"
            );
            self.manual_edit(store, &mut report);
        }

        report.chars_after = store.char_len();
        Ok(report)
    }

    async fn prune(&self, store: &mut MemoryStore, report: &mut CompactionReport) -> Result<()> {
        let count = drop_count(store.char_len(), store.len(), self.policy.prune_target_chars);
        warn!(drop = count, "memory still above ceiling, pruning");

        let request = self.request(
            "memory pruning",
            prompts::pruning_system(count),
            prompts::facts_user(store.facts())?,
        );
        match self.request_facts(request).await? {
            Some(facts) if self.acceptable(&facts) => {
                store.replace_all(facts)?;
                report.pruned = true;
                info!(chars = store.char_len(), "memory pruned");
            }
            _ => warn!("pruning produced no acceptable result, keeping current memory"),
        }
        Ok(())
    }

    fn manual_edit(&self, store: &mut MemoryStore, report: &mut CompactionReport) {
        self.operator.await_manual_edit(store.path());
        store.reload();
        report.manual_edit = true;
        report.chars_after = store.char_len();
        info!(chars = report.chars_after, "memory reloaded after manual edit");
    }

    fn compaction_request(&self, store: &MemoryStore) -> Result<CompletionRequest> {
        Ok(self.request(
            "memory compaction",
            prompts::compaction_system(),
            prompts::compaction_user(store.facts(), self.policy.prune_target_chars)?,
        ))
    }

    fn request(&self, task: &str, system: String, user: String) -> CompletionRequest {
        CompletionRequest::new(task, vec![ChatMessage::system(system), ChatMessage::user(user)])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .json_output()
    }

    /// Send `request` and parse the reply as a fact list. `Ok(None)` covers a
    /// skipped request and an unparseable reply.
    async fn request_facts(&self, request: CompletionRequest) -> Result<Option<Vec<String>>> {
        let Some(reply) = self.client.complete(&request).await? else {
            return Ok(None);
        };
        let facts = parse_fact_list(&reply);
        if facts.is_none() {
            warn!(task = %request.task, "reply is not a JSON list of facts");
        }
        Ok(facts)
    }

    fn acceptable(&self, facts: &[String]) -> bool {
        let chars: usize = facts.iter().map(|f| f.chars().count()).sum();
        if chars < self.policy.floor_chars {
            warn!(chars, floor = self.policy.floor_chars, "result below floor, discarded");
            return false;
        }
        true
    }

    /// Snapshot the store as `memory_backup_<timestamp>.json`.
    fn backup(&self, store: &MemoryStore) -> Result<PathBuf> {
        let name = format!("memory_backup_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.backup_dir.join(name);
        write_facts(&path, store.facts()).context("failed to write memory backup")?;
        Ok(path)
    }
}

/// How many facts to drop to get from `chars` down to `target`.
pub fn drop_count(chars: usize, facts: usize, target: usize) -> usize {
    let average = if facts == 0 {
        FALLBACK_FACT_CHARS
    } else {
        chars as f64 / facts as f64
    };
    let excess = chars.saturating_sub(target) as f64;
    (excess / average) as usize + 1
}

/// Parse a reply that should be a JSON list of strings, or an object holding
/// one. A surrounding code fence is tolerated.
pub fn parse_fact_list(reply: &str) -> Option<Vec<String>> {
    let body = reply.trim();
    let body = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```"))
        .and_then(|b| b.strip_suffix("```"))
        .unwrap_or(body)
        .trim();

    let items = match serde_json::from_str::<Value>(body).ok()? {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })?,
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
    )
}
