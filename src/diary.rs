//! Diary entries: dated markdown files with todo, record and thought sections.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Heading names recognized for each section, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct SectionVariants {
    pub todo: Vec<String>,
    pub record: Vec<String>,
    pub thought: Vec<String>,
    pub attachment: Vec<String>,
    pub ai_comment: Vec<String>,
}

impl Default for SectionVariants {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            todo: list(&["Todos", "Todo", "To-do", "今日待办", "待办"]),
            record: list(&[
                "Records", "Record", "Log", "Notes", "随手记录", "记录", "日志", "流水",
            ]),
            thought: list(&[
                "Thoughts",
                "Thought",
                "Mood",
                "Reflections",
                "心情和想法",
                "心情",
                "想法",
                "感悟",
                "思考",
            ]),
            attachment: list(&[
                "Attachments",
                "Attachments / Links",
                "Links",
                "附件",
                "附件 / 链接",
                "附件和链接",
            ]),
            ai_comment: list(&["AI Says", "AI Comment", "AI 说", "AI说", "AI评价", "AI建议"]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiaryEntry {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub title: String,
    /// Todo lines with their checkbox marker, e.g. `[x] call mum ✅ 2025-03-02`.
    pub todos: Vec<String>,
    pub records: Vec<String>,
    pub thoughts: Vec<String>,
    /// Text of an earlier AI comment section, empty if none.
    pub ai_comment: String,
}

impl DiaryEntry {
    /// Parse the text of the entry dated `date`.
    pub fn parse(
        date: NaiveDate,
        path: impl Into<PathBuf>,
        raw: &str,
        variants: &SectionVariants,
    ) -> Self {
        let title =
            extract_title(raw).unwrap_or_else(|| format!("Diary {}", date.format("%Y-%m-%d")));
        let cut = first_heading_position(raw, &variants.attachment).unwrap_or(raw.len());
        let main = raw[..cut].trim();

        Self {
            date,
            path: path.into(),
            title,
            todos: section_items(main, &variants.todo),
            records: section_items(main, &variants.record),
            thoughts: section_items(main, &variants.thought),
            // may sit after the attachments
            ai_comment: section_text(raw, &variants.ai_comment).to_string(),
        }
    }

    pub fn has_ai_comment(&self) -> bool {
        !self.ai_comment.is_empty()
    }

    /// The text block sent to the model for this entry.
    pub fn render(&self, include_todos: bool) -> String {
        let mut sections = Vec::with_capacity(3);
        if include_todos {
            sections.push(("## Todos", &self.todos));
        }
        sections.push(("## Records", &self.records));
        sections.push(("## Thoughts", &self.thoughts));

        let mut lines = vec![
            format!("# {} {}", self.date.format("%Y-%m-%d"), self.title),
            String::new(),
        ];
        for (heading, items) in sections {
            lines.push(heading.to_string());
            if items.is_empty() {
                lines.push("None".to_string());
            } else {
                lines.extend(items.iter().map(|item| format!("- {item}")));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

/// Reads every `YYYY-MM-DD.md` file from a set of directories.
pub struct DiaryReader {
    dirs: Vec<PathBuf>,
    variants: SectionVariants,
}

impl DiaryReader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            variants: SectionVariants::default(),
        }
    }

    pub fn with_variants(mut self, variants: SectionVariants) -> Self {
        self.variants = variants;
        self
    }

    /// Read one entry. `None` if the name is not a date or the file is unreadable.
    pub fn read_file(&self, path: &Path) -> Option<DiaryEntry> {
        let stem = path.file_stem()?.to_string_lossy();
        let date = match NaiveDate::parse_from_str(&stem, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "file name is not a date, skipped");
                return None;
            }
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to read diary file");
                return None;
            }
        };
        let raw = String::from_utf8_lossy(&bytes);
        Some(DiaryEntry::parse(date, path, &raw, &self.variants))
    }

    /// All entries, sorted by date. Drafts (stem ending in `x`) are skipped.
    pub fn read_all(&self) -> Vec<DiaryEntry> {
        let files = self.collect_files();
        let mut entries: Vec<DiaryEntry> = files
            .iter()
            .filter(|path| {
                let draft = path
                    .file_stem()
                    .is_some_and(|s| s.to_string_lossy().ends_with('x'));
                if draft {
                    debug!(file = %path.display(), "skipping draft");
                }
                !draft
            })
            .filter_map(|path| self.read_file(path))
            .collect();
        entries.sort_by_key(|e| e.date);
        info!(parsed = entries.len(), files = files.len(), "diary entries loaded");
        entries
    }

    fn collect_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            let read_dir = match std::fs::read_dir(dir) {
                Ok(rd) => rd,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "diary directory unavailable");
                    continue;
                }
            };
            let before = files.len();
            files.extend(
                read_dir
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md")),
            );
            debug!(dir = %dir.display(), files = files.len() - before, "scanned diary directory");
        }
        files
    }
}

/// Append an `## AI Says` section to the entry at `path`.
pub fn append_ai_comment(path: &Path, comment: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    write!(file, "\n\n## AI Says\n\n{comment}\n")
        .with_context(|| format!("failed to append comment to {}", path.display()))?;
    info!(file = %path.display(), "AI comment appended");
    Ok(())
}

fn extract_title(raw: &str) -> Option<String> {
    let first = raw.trim().lines().next()?;
    first
        .starts_with('#')
        .then(|| first.trim_start_matches('#').trim().to_string())
}

fn heading(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?mi)^#+\s*{}\s*$", regex::escape(name))).ok()
}

fn any_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#+").expect("heading pattern is valid"))
}

/// Byte offset of the earliest heading matching any of `names`.
fn first_heading_position(content: &str, names: &[String]) -> Option<usize> {
    names
        .iter()
        .filter_map(|name| heading(name)?.find(content))
        .map(|m| m.start())
        .min()
}

/// Body of the first section whose heading matches, in `names` order.
fn section_text<'a>(content: &'a str, names: &[String]) -> &'a str {
    for name in names {
        let Some(m) = heading(name).and_then(|re| re.find(content)) else {
            continue;
        };
        let start = m.end();
        let end = any_heading()
            .find(&content[start..])
            .map_or(content.len(), |next| start + next.start());
        return content[start..end].trim();
    }
    ""
}

fn list_item_patterns() -> &'static [Regex; 4] {
    static RE: OnceLock<[Regex; 4]> = OnceLock::new();
    RE.get_or_init(|| {
        [r"^[-*]\s*(.+)$", r"^\d+\.\s*(.+)$", r"^\[\s*\]\s*(.+)$", r"(?i)^\[\s*x\s*\]\s*(.+)$"]
            .map(|p| Regex::new(p).expect("list item pattern is valid"))
    })
}

/// List items of a section, de-duplicated in order.
fn section_items(content: &str, names: &[String]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in section_text(content, names).lines().map(str::trim) {
        let item = list_item_patterns()
            .iter()
            .find_map(|re| re.captures(line))
            .map(|c| c[1].trim().to_string());
        if let Some(item) = item.filter(|i| !i.is_empty() && !items.contains(i)) {
            items.push(item);
        }
    }
    items
}
