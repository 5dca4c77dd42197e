//! The operator-abort signal.
//!
//! [`Stopped`] is raised when the person at the terminal chooses to end the run.
//! It is not a failure: it unwinds through `?` like any error, and the binary
//! recognises it with [`is_stopped`] to exit cleanly instead of reporting an
//! error.

/// The operator chose to stop the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run stopped by operator")]
pub struct Stopped;

/// Whether `err` (or anything in its cause chain) is an operator stop.
pub fn is_stopped(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<Stopped>().is_some())
}
