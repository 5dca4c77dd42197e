//! Human-in-the-loop decisions.
//!
//! The transport and the memory compactor block on a person when automation
//! runs out: after a failed round of requests, after failed compaction rounds,
//! and when the memory profile has to be edited by hand. [`Operator`] is the
//! seam for those decisions; [`TerminalOperator`] asks on stdin/stdout.

use std::io::{BufRead, Write};
use std::path::Path;

/// What to do after a full round of failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryChoice {
    /// Run another full round of attempts.
    Retry,
    /// Give up on this request only; the caller gets no content.
    Skip,
    /// Stop the whole run.
    Abort,
}

/// What to do after every automated compaction round was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionChoice {
    /// Run another batch of compaction rounds.
    Retry,
    /// Move on to selective pruning.
    Prune,
    /// Hand the profile to a person and skip the size checks.
    ManualEdit,
    /// Stop the whole run.
    Abort,
}

/// Blocking decisions delegated to a person.
pub trait Operator: Send + Sync {
    /// Called once per exhausted round of attempts for `task`.
    fn on_request_failure(&self, task: &str) -> RetryChoice;

    /// Called when a batch of compaction rounds produced nothing acceptable.
    fn on_compaction_failure(&self) -> CompactionChoice;

    /// Block until the profile at `path` has been edited externally.
    fn await_manual_edit(&self, path: &Path);
}

/// Asks on the controlling terminal.
///
/// End of input (a closed stdin) is read as a request to stop, so a
/// non-interactive run never spins on an empty prompt.
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    fn ask(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_lowercase()),
        }
    }
}

impl Operator for TerminalOperator {
    fn on_request_failure(&self, task: &str) -> RetryChoice {
        let prompt = format!(
            "\nRequest '{task}' failed repeatedly. Press Enter to retry, 's' to skip, 'q' to quit: "
        );
        match self.ask(&prompt).as_deref() {
            None | Some("q") => RetryChoice::Abort,
            Some("s") => RetryChoice::Skip,
            Some(_) => RetryChoice::Retry,
        }
    }

    fn on_compaction_failure(&self) -> CompactionChoice {
        println!("\nMemory compaction failed repeatedly. Choose what to do next:");
        println!("  1. Try compaction again");
        println!("  2. Switch to selective pruning");
        println!("  3. Edit the profile by hand (skips size checks)");
        println!("  4. Quit");
        match self.ask("Option (1-4): ").as_deref() {
            Some("1") => CompactionChoice::Retry,
            Some("2") => CompactionChoice::Prune,
            Some("3") => CompactionChoice::ManualEdit,
            _ => CompactionChoice::Abort,
        }
    }

    fn await_manual_edit(&self, path: &Path) {
        println!("\nPlease edit the memory profile by hand: {}", path.display());
        let _ = self.ask("Press Enter when done...");
    }
}
