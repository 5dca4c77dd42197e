//! Chat-completion transport.
//!
//! Provides the [`ChatCompletion`] trait and the streaming HTTP implementation
//! [`client::LlmClient`]. A call either yields text, yields nothing because the
//! operator skipped it, or fails with [`Stopped`] because the operator ended
//! the run.

pub mod client;
pub mod log;
pub mod retry;
pub mod stream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Stopped;

pub use client::LlmClient;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged text block of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Human-readable label used in logs and interaction-log file names.
    pub task: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the endpoint to constrain the reply to a JSON object.
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn new(task: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            task: task.into(),
            messages,
            temperature: 1.0,
            max_tokens: 8000,
            json_output: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Total prompt size in characters.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// Token counts reported by the endpoint, when it reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Why a single attempt failed. Every variant is retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("response contained no content")]
    Empty,
}

/// Something that can answer a chat-completion request.
///
/// `Ok(Some(text))` is a complete reply, `Ok(None)` means the operator skipped
/// this request after repeated failures, and `Err(Stopped)` means the operator
/// ended the run.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, Stopped>;
}
