//! Streaming HTTP client for OpenAI-compatible chat-completion endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::log::{InteractionLog, InteractionRecord};
use super::retry::{with_escalation, RetryPolicy};
use super::stream::{StreamAccumulator, StreamOutput};
use super::{ChatCompletion, CompletionRequest, TransportError};
use crate::config::LlmConfig;
use crate::error::Stopped;
use crate::operator::Operator;

/// Longest error body kept from a failed HTTP response.
const MAX_ERROR_BODY: usize = 500;

pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    log: InteractionLog,
    policy: RetryPolicy,
    operator: Arc<dyn Operator>,
}

impl LlmClient {
    /// Build a client that writes interaction logs under `log_dir/api_interactions`.
    ///
    /// The configured timeout bounds each read, not the whole reply: a stream
    /// that keeps delivering chunks is read to the end however long it takes.
    pub fn new(config: &LlmConfig, log_dir: &Path, operator: Arc<dyn Operator>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(config.timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            config: config.clone(),
            log: InteractionLog::new(log_dir.join("api_interactions"))?,
            policy: RetryPolicy::from_config(config),
            operator,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        });
        if request.json_output {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// One streamed round-trip.
    async fn attempt(
        &self,
        request: &CompletionRequest,
        body: &Value,
    ) -> Result<String, TransportError> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let spinner = spinner(&request.task);
        let mut acc = StreamAccumulator::new();
        let mut stream = response.bytes_stream();
        let mut interrupted = None;

        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => {
                    acc.push_bytes(&bytes);
                    spinner.set_message(format!("{}: {} chars", request.task, acc.content_chars()));
                    if acc.is_done() {
                        break;
                    }
                }
                Err(e) => {
                    interrupted = Some(e.to_string());
                    break;
                }
            }
        }
        spinner.finish_and_clear();

        let output = acc.finish();
        let elapsed = started.elapsed();

        if let Some(error) = interrupted {
            if !output.content.is_empty() {
                self.persist(request, &output, elapsed, Some(error.as_str()));
            }
            return Err(TransportError::Stream(error));
        }
        if output.content.is_empty() {
            return Err(TransportError::Empty);
        }

        match output.usage {
            Some(usage) => info!(
                task = %request.task,
                elapsed_secs = elapsed.as_secs_f64(),
                chars = output.content.chars().count(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "request complete"
            ),
            None => info!(
                task = %request.task,
                elapsed_secs = elapsed.as_secs_f64(),
                chars = output.content.chars().count(),
                "request complete"
            ),
        }

        self.persist(request, &output, elapsed, None);
        Ok(output.content)
    }

    fn persist(
        &self,
        request: &CompletionRequest,
        output: &StreamOutput,
        elapsed: Duration,
        error: Option<&str>,
    ) {
        let record = InteractionRecord {
            at: Local::now(),
            task: &request.task,
            model: &self.config.model,
            messages: &request.messages,
            content: &output.content,
            reasoning: &output.reasoning,
            usage: output.usage,
            elapsed,
            error,
        };
        if let Err(e) = self.log.write(&record) {
            warn!(task = %request.task, error = %e, "failed to save interaction log");
        }
    }
}

#[async_trait]
impl ChatCompletion for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, Stopped> {
        info!(
            task = %request.task,
            prompt_chars = request.prompt_chars(),
            "sending request"
        );
        let body = self.request_body(request);
        with_escalation(&self.policy, &request.task, self.operator.as_ref(), |_| {
            self.attempt(request, &body)
        })
        .await
    }
}

fn spinner(task: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(task.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
