//! Wire shapes and status taxonomy of the remote judge service.

use serde::{Deserialize, Serialize};

use crate::exec::Outcome;

#[derive(Serialize, Debug)]
pub(super) struct SubmissionRequest<'a> {
    pub source_code: &'a str,
    pub language_id: u32,
    pub stdin: &'a str,
}

#[derive(Deserialize, Debug)]
pub(super) struct SubmissionToken {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub(super) struct SubmissionStatus {
    pub id: u32,
    #[allow(dead_code)]
    pub description: String,
}

/// Everything the service reports about a submission once polled.
///
/// All output fields are nullable on the wire; normalization flattens them
/// into the always-present strings of `ExecutionResult`.
#[derive(Deserialize, Debug)]
pub(super) struct SubmissionReport {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    pub status: SubmissionStatus,
}

/// Maps the service's numeric status to our outcome taxonomy.
///
/// `None` means the submission is still queued or running and polling must
/// continue. Status 4 (wrong answer) still means the code ran to
/// completion; grading correctness is not this platform's job.
pub(super) fn outcome_for_status(id: u32) -> Option<Outcome> {
    match id {
        1 | 2 => None,
        3 | 4 => Some(Outcome::Success),
        5 => Some(Outcome::Timeout),
        6 => Some(Outcome::CompileError),
        7..=12 => Some(Outcome::RuntimeError),
        _ => Some(Outcome::InternalError),
    }
}
