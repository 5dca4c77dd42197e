//! The fact store: an ordered, de-duplicated list of facts backed by a JSON
//! array on disk.
//!
//! Loading never fails (a missing or corrupt file is an empty store) and every
//! change is written through immediately. Edits address facts by text: an
//! exact match wins, otherwise the fragment must occur in exactly one fact.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::types::{FactEdit, MemoryUpdate, UpdateSummary};

/// How an edit's target text resolved against the stored facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// A fact equal to the text.
    Exact(usize),
    /// The only fact containing the text.
    Fragment(usize),
    Missing,
    /// More than one fact contains the text.
    Ambiguous(usize),
}

#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    facts: Vec<String>,
}

impl MemoryStore {
    /// Load the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let facts = read_facts(&path);
        Self { path, facts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Total characters across all facts. No normalization is applied.
    pub fn char_len(&self) -> usize {
        self.facts.iter().map(|f| f.chars().count()).sum()
    }

    /// One `- fact` line per fact.
    pub fn render_bullets(&self) -> String {
        self.facts
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Apply adds, then removes, then updates, and persist if anything changed.
    ///
    /// Edits whose target is missing or ambiguous are skipped with a warning;
    /// the rest of the instruction still applies.
    pub fn apply(&mut self, update: &MemoryUpdate) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::default();

        for fact in &update.add {
            if self.add(fact) {
                summary.added += 1;
            }
        }
        for fragment in &update.remove {
            match self.remove(fragment) {
                Some(true) => summary.removed += 1,
                Some(false) => summary.skipped += 1,
                None => {}
            }
        }
        for edit in &update.update {
            match self.edit(edit) {
                Some(true) => summary.updated += 1,
                Some(false) => summary.skipped += 1,
                None => {}
            }
        }

        if summary.changed() {
            info!(
                added = summary.added,
                removed = summary.removed,
                updated = summary.updated,
                skipped = summary.skipped,
                "memory updated"
            );
            self.save()?;
        }
        Ok(summary)
    }

    /// Replace every fact, dropping empties and duplicates, and persist.
    pub fn replace_all(&mut self, facts: Vec<String>) -> Result<()> {
        self.facts = normalize(facts);
        self.save()?;
        info!(facts = self.facts.len(), chars = self.char_len(), "memory replaced");
        Ok(())
    }

    /// Re-read the file, discarding the in-memory state.
    pub fn reload(&mut self) {
        self.facts = read_facts(&self.path);
    }

    /// Write the store to disk (temp file + rename).
    pub fn save(&self) -> Result<()> {
        write_facts(&self.path, &self.facts)
    }

    /// Returns whether the fact was appended.
    fn add(&mut self, fact: &str) -> bool {
        if fact.trim().is_empty() || self.facts.iter().any(|f| f == fact) {
            return false;
        }
        self.facts.push(fact.to_string());
        true
    }

    /// `None` for an empty fragment, otherwise whether a fact was removed.
    fn remove(&mut self, fragment: &str) -> Option<bool> {
        if fragment.is_empty() {
            debug!("ignoring empty remove target");
            return None;
        }
        match self.resolve(fragment) {
            Target::Exact(i) | Target::Fragment(i) => {
                let removed = self.facts.remove(i);
                debug!(fact = %removed, "fact removed");
                Some(true)
            }
            Target::Missing => {
                warn!(fragment = fragment, "no fact matches remove target, skipped");
                Some(false)
            }
            Target::Ambiguous(n) => {
                warn!(fragment = fragment, candidates = n, "remove target is ambiguous, skipped");
                Some(false)
            }
        }
    }

    /// `None` for an edit without an old text, otherwise whether a fact changed.
    fn edit(&mut self, edit: &FactEdit) -> Option<bool> {
        if edit.old.is_empty() {
            debug!("ignoring update without old text");
            return None;
        }
        let (index, replacement) = match self.resolve(&edit.old) {
            Target::Exact(i) => (i, edit.new.clone()),
            Target::Fragment(i) => (i, self.facts[i].replace(&edit.old, &edit.new)),
            Target::Missing => {
                warn!(fragment = %edit.old, "no fact matches update target, skipped");
                return Some(false);
            }
            Target::Ambiguous(n) => {
                warn!(fragment = %edit.old, candidates = n, "update target is ambiguous, skipped");
                return Some(false);
            }
        };

        if replacement.trim().is_empty() {
            warn!(fragment = %edit.old, "update would leave an empty fact, skipped");
            return Some(false);
        }
        if self
            .facts
            .iter()
            .enumerate()
            .any(|(i, f)| i != index && *f == replacement)
        {
            // the edited fact now duplicates another one
            self.facts.remove(index);
        } else {
            self.facts[index] = replacement;
        }
        Some(true)
    }

    fn resolve(&self, text: &str) -> Target {
        if let Some(i) = self.facts.iter().position(|f| f == text) {
            return Target::Exact(i);
        }
        let mut candidates = self
            .facts
            .iter()
            .enumerate()
            .filter(|(_, f)| f.contains(text))
            .map(|(i, _)| i);
        match (candidates.next(), candidates.count()) {
            (None, _) => Target::Missing,
            (Some(i), 0) => Target::Fragment(i),
            (Some(_), rest) => Target::Ambiguous(rest + 1),
        }
    }
}

/// Read a fact list; a missing or unreadable file yields an empty list.
fn read_facts(path: &Path) -> Vec<String> {
    if !path.exists() {
        debug!(path = %path.display(), "no memory file, starting empty");
        return Vec::new();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read memory file, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(items) => {
            let facts = normalize(
                items
                    .into_iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            );
            debug!(facts = facts.len(), "memory loaded");
            facts
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "memory file is not a JSON list, starting empty"
            );
            Vec::new()
        }
    }
}

/// Write `facts` as a pretty-printed JSON array.
pub(crate) fn write_facts(path: &Path, facts: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(facts)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Drop empty facts and later duplicates, keeping first-seen order.
fn normalize(facts: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(facts.len());
    for fact in facts {
        if !fact.trim().is_empty() && !out.contains(&fact) {
            out.push(fact);
        }
    }
    out
}
