#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use quill::config::{LlmConfig, MemoryConfig};
use quill::error::Stopped;
use quill::llm::{ChatCompletion, CompletionRequest};
use quill::memory::compactor::Compactor;
use quill::memory::store::MemoryStore;
use quill::memory::Memory;
use quill::operator::{CompactionChoice, Operator, RetryChoice};

/// A [`ChatCompletion`] that replays canned replies and records every request.
/// Once the script runs out it answers `Ok(None)`.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<Option<String>, Stopped>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        let client = Self::default();
        client
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Ok(Some(r.to_string()))));
        Arc::new(client)
    }

    /// Every call fails with [`Stopped`].
    pub fn stopping() -> Arc<Self> {
        let client = Self::default();
        client.replies.lock().unwrap().push_back(Err(Stopped));
        Arc::new(client)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, Stopped> {
        self.requests.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        match replies.front() {
            Some(Err(Stopped)) => Err(Stopped),
            _ => replies.pop_front().unwrap_or(Ok(None)),
        }
    }
}

/// An [`Operator`] with fixed answers. A manual edit overwrites the profile
/// with `manual_facts`. Failed requests are aborted unless `retry_choices`
/// says otherwise.
#[derive(Default)]
pub struct ScriptedOperator {
    pub retry_choices: Mutex<VecDeque<RetryChoice>>,
    pub compaction_choices: Mutex<VecDeque<CompactionChoice>>,
    pub manual_facts: Vec<String>,
    pub manual_edits: AtomicUsize,
    pub compaction_prompts: AtomicUsize,
    pub request_prompts: AtomicUsize,
}

impl ScriptedOperator {
    pub fn with_choices(choices: &[CompactionChoice]) -> Self {
        Self {
            compaction_choices: Mutex::new(choices.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn with_retry_choices(choices: &[RetryChoice]) -> Self {
        Self {
            retry_choices: Mutex::new(choices.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn request_prompts(&self) -> usize {
        self.request_prompts.load(Ordering::SeqCst)
    }

    pub fn manual_edits(&self) -> usize {
        self.manual_edits.load(Ordering::SeqCst)
    }

    pub fn compaction_prompts(&self) -> usize {
        self.compaction_prompts.load(Ordering::SeqCst)
    }
}

impl Operator for ScriptedOperator {
    fn on_request_failure(&self, _task: &str) -> RetryChoice {
        self.request_prompts.fetch_add(1, Ordering::SeqCst);
        self.retry_choices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RetryChoice::Abort)
    }

    fn on_compaction_failure(&self) -> CompactionChoice {
        self.compaction_prompts.fetch_add(1, Ordering::SeqCst);
        self.compaction_choices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CompactionChoice::Abort)
    }

    fn await_manual_edit(&self, path: &Path) {
        self.manual_edits.fetch_add(1, Ordering::SeqCst);
        std::fs::write(path, serde_json::to_string(&self.manual_facts).unwrap()).unwrap();
    }
}

/// Small thresholds so tests can cross them with a handful of facts.
pub fn small_policy() -> MemoryConfig {
    MemoryConfig {
        enabled: true,
        high_water_chars: 100,
        floor_chars: 40,
        ceiling_chars: 80,
        prune_target_chars: 60,
        compaction_rounds: 3,
    }
}

/// A fact of exactly `len` characters, distinct per `tag`.
pub fn fact(tag: char, len: usize) -> String {
    std::iter::repeat(tag).take(len).collect()
}

pub fn facts_json(facts: &[String]) -> String {
    serde_json::to_string(facts).unwrap()
}

pub fn open_store(dir: &Path, facts: &[String]) -> MemoryStore {
    let mut store = MemoryStore::open(dir.join("memory.json"));
    store.replace_all(facts.to_vec()).unwrap();
    store
}

pub fn compactor(
    client: Arc<ScriptedClient>,
    operator: Arc<ScriptedOperator>,
    backup_dir: &Path,
) -> Compactor {
    Compactor::new(client, operator, &small_policy(), &LlmConfig::default(), backup_dir)
}

pub fn memory(
    dir: &Path,
    facts: &[String],
    client: Arc<ScriptedClient>,
    operator: Arc<ScriptedOperator>,
) -> Memory {
    Memory::new(open_store(dir, facts), compactor(client, operator, dir))
}
