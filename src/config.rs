use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuillConfig {
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub attempts_per_round: u32,
    pub retry_delay_secs: u64,
    /// Used for compaction and pruning requests.
    pub default_temperature: f32,
    pub summary_temperature: f32,
    pub evaluation_temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub diary_dirs: Vec<String>,
    pub output_dir: String,
    pub summary_dir: String,
    pub log_dir: String,
    pub profile_path: String,
}

/// Size policy for the memory profile, in characters.
///
/// A pass starts once the profile exceeds `high_water_chars`. Automated results
/// shorter than `floor_chars` are rejected. Anything still above
/// `ceiling_chars` after compaction is pruned toward `prune_target_chars`, and
/// escalated to a manual edit if that is not enough.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub high_water_chars: usize,
    pub floor_chars: usize,
    pub ceiling_chars: usize,
    pub prune_target_chars: usize,
    pub compaction_rounds: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub file_logging: bool,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            paths: PathsConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com/v1/chat/completions".into(),
            model: "deepseek-reasoner".into(),
            api_key: String::new(),
            timeout_secs: 180,
            max_tokens: 8000,
            attempts_per_round: 3,
            retry_delay_secs: 2,
            default_temperature: 0.75,
            summary_temperature: 1.0,
            evaluation_temperature: 1.5,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let dir = |name: &str| {
            default_quill_dir()
                .join(name)
                .to_string_lossy()
                .into_owned()
        };
        Self {
            diary_dirs: vec![dir("Daily")],
            output_dir: dir("Weekly_Analysis"),
            summary_dir: dir("Weekly_Summary"),
            log_dir: dir("log"),
            profile_path: dir("memory.json"),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            high_water_chars: 4000,
            floor_chars: 1200,
            ceiling_chars: 2400,
            prune_target_chars: 2000,
            compaction_rounds: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            file_logging: true,
        }
    }
}

impl LlmConfig {
    /// Longest wait for any single read from the endpoint.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Returns `~/.quill/`
pub fn default_quill_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quill")
}

/// Returns the default config file path: `~/.quill/config.toml`
pub fn default_config_path() -> PathBuf {
    default_quill_dir().join("config.toml")
}

impl QuillConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            QuillConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (QUILL_API_KEY / DEEPSEEK_API_KEY,
    /// QUILL_MODEL, QUILL_LOG_LEVEL, QUILL_PROFILE).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) =
            std::env::var("QUILL_API_KEY").or_else(|_| std::env::var("DEEPSEEK_API_KEY"))
        {
            self.llm.api_key = val;
        }
        if let Ok(val) = std::env::var("QUILL_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("QUILL_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("QUILL_PROFILE") {
            self.paths.profile_path = val;
        }
    }

    /// Check that the model can be called and create the output directories.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            bail!("no API key configured: set QUILL_API_KEY or [llm].api_key in config.toml");
        }
        for dir in [self.output_dir(), self.summary_dir(), self.log_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn diary_dirs(&self) -> Vec<PathBuf> {
        self.paths.diary_dirs.iter().map(|d| expand_tilde(d)).collect()
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.output_dir)
    }

    pub fn summary_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.summary_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.log_dir)
    }

    /// Resolve the memory profile path, expanding `~` if needed.
    pub fn profile_path(&self) -> PathBuf {
        expand_tilde(&self.paths.profile_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
