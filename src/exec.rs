use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single run request as submitted by the workspace UI.
///
/// The request is immutable once handed to the dispatcher; `language` is
/// matched against the configured language table rather than a hardcoded
/// enum, so the supported set is a deployment decision.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecutionRequest {
    pub language: String,
    pub source_code: String,
    pub stdin: Option<String>,
    pub time_limit_ms: Option<u64>,
}

/// Terminal states a run can reach.
///
/// Ordinary program failures (crashes, compile errors, timeouts) are
/// outcomes, never Rust-level errors: the UI branches on this field and
/// nothing else.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RuntimeError,
    CompileError,
    Timeout,
    InternalError,
}

/// The uniform result contract every execution backend fills in.
///
/// `stdout` and `stderr` are always present (possibly empty) so the UI
/// never branches on nullability.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>, duration: Duration) -> Self {
        Self {
            outcome: Outcome::Success,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self {
            outcome: Outcome::Timeout,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// A fault in the platform rather than in the submitted code.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::InternalError,
            stdout: String::new(),
            stderr: message.into(),
            duration_ms: 0,
        }
    }
}

/// Structured failures that are not execution outcomes.
///
/// These reject the run itself: the caller routed a request the dispatcher
/// must not execute, or a newer request from the same workspace made this
/// one stale. User-code faults never appear here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("language `{0}` renders through the live preview and is not runnable here")]
    PreviewOnly(String),
    #[error("run was superseded by a newer request from the same workspace")]
    Superseded,
}
