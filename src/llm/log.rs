//! Write-only audit trail of model interactions.
//!
//! One plain-text file per completed attempt, named
//! `<timestamp>_<task label>.txt`. Files are never read back.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ChatMessage, TokenUsage};

/// One request/response pair.
#[derive(Debug)]
pub struct InteractionRecord<'a> {
    pub at: DateTime<Local>,
    pub task: &'a str,
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub content: &'a str,
    pub reasoning: &'a str,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
    /// Set when the attempt ended in an error after producing content.
    pub error: Option<&'a str>,
}

impl InteractionRecord<'_> {
    /// Render the record as the log file body.
    pub fn render(&self) -> String {
        let banner = |title: &str| format!("\n{eq} {title} {eq}\n", eq = "=".repeat(40));
        let mut out = String::new();

        let _ = writeln!(out, "Time: {}", self.at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Task: {}", self.task);
        let _ = writeln!(out, "Model: {}", self.model);
        let _ = writeln!(out, "Elapsed: {:.2}s", self.elapsed.as_secs_f64());
        if let Some(usage) = self.usage {
            let _ = writeln!(
                out,
                "Tokens: {} + {}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        if let Some(error) = self.error {
            let _ = writeln!(out, "Error: {error}");
        }

        out.push_str(&banner("REQUEST"));
        for msg in self.messages {
            let role = msg.role.as_str().to_uppercase();
            let _ = write!(out, "\n[{role}]\n{}\n{}\n", "-".repeat(20), msg.content);
        }

        if !self.reasoning.is_empty() {
            out.push_str(&banner("REASONING"));
            let _ = write!(out, "\n{}\n", self.reasoning);
        }

        out.push_str(&banner("RESPONSE"));
        let _ = write!(out, "\n{}\n", self.content);
        out
    }
}

/// Directory of interaction log files.
#[derive(Debug, Clone)]
pub struct InteractionLog {
    dir: PathBuf,
}

impl InteractionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `record`, returning the path written.
    pub fn write(&self, record: &InteractionRecord<'_>) -> Result<PathBuf> {
        let base = format!(
            "{}_{}",
            record.at.format("%Y%m%d_%H%M%S_%3f"),
            sanitize_label(record.task)
        );
        let mut path = self.dir.join(format!("{base}.txt"));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{base}_{n}.txt"));
            n += 1;
        }

        std::fs::write(&path, record.render())
            .with_context(|| format!("failed to write interaction log {}", path.display()))?;
        Ok(path)
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use tempfile::TempDir;

    fn record<'a>(messages: &'a [ChatMessage], reasoning: &'a str) -> InteractionRecord<'a> {
        InteractionRecord {
            at: Local::now(),
            task: "weekly summary: 2025/W01",
            model: "deepseek-reasoner",
            messages,
            content: "A calm week.",
            reasoning,
            usage: Some(TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
            }),
            elapsed: Duration::from_millis(1500),
            error: None,
        }
    }

    #[test]
    fn sanitizes_file_name_characters() {
        assert_eq!(sanitize_label(r#"a/b\c:d*e?"f<g>h|"#), "a_b_c_d_e__f_g_h_");
        assert_eq!(sanitize_label("每日评价"), "每日评价");
    }

    #[test]
    fn render_contains_all_sections() {
        let messages = [ChatMessage::system("sys"), ChatMessage::user("diary")];
        let text = record(&messages, "pondering").render();
        assert!(text.contains("Task: weekly summary: 2025/W01"));
        assert!(text.contains("Model: deepseek-reasoner"));
        assert!(text.contains("Tokens: 100 + 20"));
        assert!(text.contains("[SYSTEM]"));
        assert!(text.contains("[USER]"));
        assert!(text.contains("REASONING"));
        assert!(text.contains("pondering"));
        assert!(text.ends_with("A calm week.\n"));
    }

    #[test]
    fn reasoning_section_omitted_when_empty() {
        let messages = [ChatMessage::user("diary")];
        assert!(!record(&messages, "").render().contains("REASONING"));
    }

    #[test]
    fn same_instant_does_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let log = InteractionLog::new(tmp.path().join("api")).unwrap();
        let messages = [ChatMessage::user("diary")];
        let rec = record(&messages, "");

        let first = log.write(&rec).unwrap();
        let second = log.write(&rec).unwrap();

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().contains("weekly summary_ 2025_W01"));
        assert_eq!(std::fs::read_dir(log.dir()).unwrap().count(), 2);
    }
}
