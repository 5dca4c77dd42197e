//! Diary assistant with a long-term memory profile.
//!
//! Quill reads a diary kept as dated markdown files, groups it into ISO weeks
//! and asks an OpenAI-compatible chat endpoint for three kinds of report:
//!
//! | Report | Input | Updates memory |
//! |--------|-------|----------------|
//! | **Weekly summary** | one finished week | no |
//! | **Daily evaluation** | profile, past summaries, this week, open todos | yes |
//! | **Weekly analysis** | profile, past summaries, this week, open todos | yes |
//!
//! # Architecture
//!
//! - **Transport**: streamed chat completions with bounded retries; after a
//!   failed round a person decides to retry, skip or stop
//! - **Memory**: a JSON list of facts edited by the model's own
//!   `memory_updates` blocks, kept under a size ceiling by LLM compaction,
//!   pruning and, as a last resort, a manual edit
//! - **Context**: pure renderers for the profile, past summaries, diary and
//!   open todos
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`llm`]: chat-completion trait, streaming client, retries, interaction logs
//! - [`memory`]: fact store, update extraction, compaction
//! - [`context`]: prompt context rendering
//! - [`analysis`]: the report orchestrator
//! - [`diary`] / [`period`]: diary parsing, weeks and the summary archive

pub mod analysis;
pub mod config;
pub mod context;
pub mod diary;
pub mod error;
pub mod llm;
pub mod memory;
pub mod operator;
pub mod period;
pub mod prompts;
