//! ISO weeks as the summarization period, and the on-disk summary archive.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::diary::DiaryEntry;

/// A Monday-to-Sunday week, identified by its ISO year and week number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Week {
    pub year: i32,
    pub week: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Week {
    /// The week containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let iso = start.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True once the whole week lies before `today`.
    pub fn is_complete(&self, today: NaiveDate) -> bool {
        self.end < today
    }

    /// `YYYY_Www_YYYYmmdd-YYYYmmdd.md`
    pub fn file_name(&self) -> String {
        format!(
            "{}_W{:02}_{}-{}.md",
            self.year,
            self.week,
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }

    fn parse_file_name(name: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"^(\d{4})_W(\d{2})_(\d{8})-(\d{8})\.md$")
                .expect("summary name pattern is valid")
        });
        let caps = re.captures(name)?;
        Some(Self {
            year: caps[1].parse().ok()?,
            week: caps[2].parse().ok()?,
            start: NaiveDate::parse_from_str(&caps[3], "%Y%m%d").ok()?,
            end: NaiveDate::parse_from_str(&caps[4], "%Y%m%d").ok()?,
        })
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} W{:02} ({} to {})",
            self.year,
            self.week,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// One week and the entries written in it.
#[derive(Debug, Clone)]
pub struct WeekEntries {
    pub week: Week,
    pub entries: Vec<DiaryEntry>,
}

/// Bucket entries by week, earliest week first.
pub fn group_by_week(entries: &[DiaryEntry]) -> Vec<WeekEntries> {
    let mut weeks: BTreeMap<NaiveDate, WeekEntries> = BTreeMap::new();
    for entry in entries {
        let week = Week::of(entry.date);
        weeks
            .entry(week.start)
            .or_insert_with(|| WeekEntries {
                week,
                entries: Vec::new(),
            })
            .entries
            .push(entry.clone());
    }
    info!(weeks = weeks.len(), "diary grouped into weeks");
    weeks.into_values().collect()
}

/// Weekly summaries stored as markdown files in one directory.
pub struct SummaryArchive {
    dir: PathBuf,
}

impl SummaryArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, week: &Week) -> PathBuf {
        self.dir.join(week.file_name())
    }

    pub fn has_summary(&self, week: &Week) -> bool {
        self.path_for(week).exists()
    }

    /// Complete weeks that have entries but no stored summary.
    pub fn weeks_needing_summary<'a>(
        &self,
        weeks: &'a [WeekEntries],
        today: NaiveDate,
    ) -> Vec<&'a WeekEntries> {
        weeks
            .iter()
            .filter(|w| {
                w.week.is_complete(today) && !w.entries.is_empty() && !self.has_summary(&w.week)
            })
            .collect()
    }

    /// Write `summary` under a metadata header.
    pub fn save(&self, week: &WeekEntries, summary: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let w = &week.week;
        let header = format!(
            "# {} Week {} Summary\n**Period**: {} to {}\n**Generated**: {}\n**Entries**: {}\n\n---\n\n",
            w.year,
            w.week,
            w.start.format("%Y-%m-%d"),
            w.end.format("%Y-%m-%d"),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            week.entries.len()
        );
        let path = self.path_for(w);
        std::fs::write(&path, header + summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "weekly summary saved");
        Ok(path)
    }

    /// Every stored summary, ordered by file name. Files with other names are ignored.
    pub fn load_all(&self) -> Result<Vec<(Week, String)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut summaries = Vec::new();
        for name in names {
            let Some(week) = Week::parse_file_name(&name) else {
                continue;
            };
            match std::fs::read_to_string(self.dir.join(&name)) {
                Ok(text) => summaries.push((week, text)),
                Err(e) => warn!(file = %name, error = %e, "failed to read summary"),
            }
        }
        Ok(summaries)
    }
}
