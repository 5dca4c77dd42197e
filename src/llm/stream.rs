//! Server-sent-event stream decoding.
//!
//! The endpoint streams `data: <json>` lines and ends with `data: [DONE]`.
//! [`StreamAccumulator`] folds raw bytes into content, reasoning and token
//! usage. Lines that are not data lines, or whose JSON does not parse, are
//! dropped without interrupting the fold.

use serde_json::Value;

use super::TokenUsage;

/// The useful parts of one parsed chunk. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Classification of a single line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Chunk(StreamChunk),
    Done,
    /// Blank lines, comments, non-data fields and malformed JSON.
    Ignored,
}

/// Parse one line of the event stream.
pub fn parse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed stream chunk");
            return SseLine::Ignored;
        }
    };

    let delta = &v["choices"][0]["delta"];
    let content = delta["content"].as_str().map(str::to_string);
    let reasoning = delta["reasoning_content"].as_str().map(str::to_string);

    let usage = v.get("usage").filter(|u| u.is_object()).map(|u| TokenUsage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    });

    SseLine::Chunk(StreamChunk {
        content,
        reasoning,
        usage,
    })
}

/// Final result of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutput {
    pub content: String,
    pub reasoning: String,
    pub usage: Option<TokenUsage>,
    /// Whether the `[DONE]` marker was seen (as opposed to the connection closing).
    pub saw_done: bool,
}

/// Incremental reducer over the bytes of an event stream.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    output: StreamOutput,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. Lines may be split across calls, including in the
    /// middle of a multi-byte character.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if self.is_done() {
            return;
        }
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.push_line(&String::from_utf8_lossy(&line));
            if self.is_done() {
                self.pending.clear();
                return;
            }
        }
    }

    /// Feed one complete line.
    pub fn push_line(&mut self, line: &str) {
        if self.is_done() {
            return;
        }
        match parse_line(line) {
            SseLine::Chunk(chunk) => self.apply(chunk),
            SseLine::Done => self.output.saw_done = true,
            SseLine::Ignored => {}
        }
    }

    pub fn apply(&mut self, chunk: StreamChunk) {
        if let Some(text) = chunk.content {
            self.output.content.push_str(&text);
        }
        if let Some(text) = chunk.reasoning {
            self.output.reasoning.push_str(&text);
        }
        if chunk.usage.is_some() {
            self.output.usage = chunk.usage;
        }
    }

    pub fn is_done(&self) -> bool {
        self.output.saw_done
    }

    /// Characters of content received so far.
    pub fn content_chars(&self) -> usize {
        self.output.content.chars().count()
    }

    /// Flush any unterminated trailing line and return the result.
    pub fn finish(mut self) -> StreamOutput {
        if !self.pending.is_empty() && !self.is_done() {
            let rest = std::mem::take(&mut self.pending);
            self.push_line(&String::from_utf8_lossy(&rest));
        }
        self.output
    }
}
