//! Bounded retry rounds with operator escalation.
//!
//! Control flow is an explicit loop: a round of up to `attempts` tries with a
//! fixed delay between them, then one operator decision (retry the round, skip
//! this request, or stop the run).

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::LlmConfig;
use crate::error::Stopped;
use crate::operator::{Operator, RetryChoice};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per round before the operator is asked.
    pub attempts: u32,
    /// Pause between attempts within a round.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            attempts: config.attempts_per_round.max(1),
            delay: config.retry_delay(),
        }
    }
}

/// Run `attempt` until it succeeds, escalating to `operator` after every
/// exhausted round.
///
/// `attempt` receives the 1-based attempt number within the current round.
/// Returns `Ok(None)` when the operator skips, `Err(Stopped)` when they abort.
pub async fn with_escalation<T, E, F, Fut>(
    policy: &RetryPolicy,
    task: &str,
    operator: &dyn Operator,
    mut attempt: F,
) -> Result<Option<T>, Stopped>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    loop {
        for n in 1..=attempts {
            match attempt(n).await {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    warn!(task, attempt = n, of = attempts, error = %e, "request failed");
                    if n < attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        error!(task, attempts, "request failed on every attempt of the round");
        match operator.on_request_failure(task) {
            RetryChoice::Retry => continue,
            RetryChoice::Skip => {
                warn!(task, "request skipped by operator");
                return Ok(None);
            }
            RetryChoice::Abort => return Err(Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::CompactionChoice;
    use std::cell::Cell;
    use std::path::Path;
    use std::sync::Mutex;

    /// Replies from a fixed script and records how many times it was asked.
    struct Scripted {
        choices: Mutex<Vec<RetryChoice>>,
        asked: Mutex<u32>,
    }

    impl Scripted {
        fn new(mut choices: Vec<RetryChoice>) -> Self {
            choices.reverse();
            Self {
                choices: Mutex::new(choices),
                asked: Mutex::new(0),
            }
        }

        fn asked(&self) -> u32 {
            *self.asked.lock().unwrap()
        }
    }

    impl Operator for Scripted {
        fn on_request_failure(&self, _task: &str) -> RetryChoice {
            *self.asked.lock().unwrap() += 1;
            self.choices.lock().unwrap().pop().unwrap_or(RetryChoice::Abort)
        }

        fn on_compaction_failure(&self) -> CompactionChoice {
            CompactionChoice::Abort
        }

        fn await_manual_edit(&self, _path: &Path) {}
    }

    fn instant() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn escalates_once_after_third_failure() {
        let operator = Scripted::new(vec![RetryChoice::Skip]);
        let calls = Cell::new(0u32);
        let result: Result<Option<()>, Stopped> =
            with_escalation(&instant(), "test", &operator, |n| {
                calls.set(calls.get() + 1);
                // the operator must not have been consulted before attempt 3 ends
                assert_eq!(operator.asked(), 0, "escalated before attempt {n}");
                async { Err::<(), _>("connection reset") }
            })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.get(), 3);
        assert_eq!(operator.asked(), 1);
    }

    #[tokio::test]
    async fn success_on_last_attempt_does_not_escalate() {
        let operator = Scripted::new(vec![]);
        let result = with_escalation(&instant(), "test", &operator, |n| async move {
            if n < 3 {
                Err("timeout")
            } else {
                Ok("text")
            }
        })
        .await;

        assert_eq!(result, Ok(Some("text")));
        assert_eq!(operator.asked(), 0);
    }

    #[tokio::test]
    async fn retry_choice_runs_a_fresh_round() {
        let operator = Scripted::new(vec![RetryChoice::Retry]);
        let calls = Cell::new(0u32);
        let result = with_escalation(&instant(), "test", &operator, |_| {
            calls.set(calls.get() + 1);
            let ok = calls.get() == 5;
            async move {
                if ok {
                    Ok(42)
                } else {
                    Err("HTTP 502")
                }
            }
        })
        .await;

        assert_eq!(result, Ok(Some(42)));
        assert_eq!(calls.get(), 5);
        assert_eq!(operator.asked(), 1);
    }

    #[tokio::test]
    async fn abort_is_a_stop_not_a_skip() {
        let operator = Scripted::new(vec![RetryChoice::Abort]);
        let result: Result<Option<()>, Stopped> =
            with_escalation(&instant(), "test", &operator, |_| async { Err::<(), _>("down") })
                .await;
        assert_eq!(result, Err(Stopped));
    }
}
