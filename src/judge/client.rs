use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{JudgeConfig, LanguageBackend};
use crate::dispatch::{ExecutionStrategy, PreparedRun};
use crate::exec::{ExecutionResult, Outcome};

use super::protocol::{
    SubmissionReport, SubmissionRequest, SubmissionToken, outcome_for_status,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a submit/poll remote judge service
///
/// Languages that need a real interpreter or compiler are shipped to the
/// judge service and polled until a terminal status arrives, the poll
/// budget runs out, or the run is cancelled. The client owns the only
/// connection pool in the system; everything else about it is stateless
/// between runs.
pub struct JudgeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    submit_attempts: u32,
}

/// Poll-loop bookkeeping for one in-flight submission.
struct JudgeSubmission {
    token: String,
    language_id: u32,
    created_at: DateTime<Utc>,
    poll_attempts: u32,
    max_polls: u32,
}

impl JudgeSubmission {
    fn new(token: String, language_id: u32, time_limit: Duration, poll_interval: Duration) -> Self {
        // Enough polls to cover the full time budget at the configured
        // interval, rounding up so a single-interval budget still polls.
        let max_polls = time_limit
            .as_millis()
            .div_ceil(poll_interval.as_millis().max(1)) as u32;
        Self {
            token,
            language_id,
            created_at: Utc::now(),
            poll_attempts: 0,
            max_polls: max_polls.max(1),
        }
    }

    fn exhausted(&self) -> bool {
        self.poll_attempts >= self.max_polls
    }
}

impl JudgeClient {
    pub fn new(config: &JudgeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build judge HTTP client")?;

        log::info!("JudgeClient initialized against {}", config.base_url);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            submit_attempts: config.submit_attempts.max(1),
        })
    }

    /// Submits source to the service, retrying a bounded number of times.
    ///
    /// The retry budget is deliberately small: each successful submission is
    /// a billable execution on the remote side, so transport flakiness must
    /// not fan out into duplicate runs.
    async fn submit(&self, body: &SubmissionRequest<'_>) -> Result<String> {
        let mut last_error = None;
        for attempt in 1..=self.submit_attempts {
            match self.try_submit(body).await {
                Ok(token) => {
                    log::debug!("Judge accepted submission, token {token}");
                    return Ok(token);
                }
                Err(e) => {
                    log::warn!(
                        "Judge submit attempt {attempt}/{} failed: {e:#}",
                        self.submit_attempts
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no submit attempts were made")))
            .context("judge service unreachable")
    }

    async fn try_submit(&self, body: &SubmissionRequest<'_>) -> Result<String> {
        let url = format!(
            "{}/submissions?base64_encoded=false&wait=false",
            self.base_url
        );
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("X-RapidAPI-Key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let token: SubmissionToken = response.json().await?;
        Ok(token.token)
    }

    async fn fetch_report(&self, token: &str) -> Result<SubmissionReport> {
        let url = format!(
            "{}/submissions/{token}?base64_encoded=false",
            self.base_url
        );
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-RapidAPI-Key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let report: SubmissionReport = response.json().await?;
        Ok(report)
    }
}

#[async_trait]
impl ExecutionStrategy for JudgeClient {
    async fn execute(
        &self,
        run: &PreparedRun<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let LanguageBackend::Judge { language_id } = run.language.backend else {
            bail!(
                "judge client invoked for non-judge language {}",
                run.language.name
            );
        };

        let body = SubmissionRequest {
            source_code: run.source_code,
            language_id,
            stdin: run.stdin,
        };
        let token = self.submit(&body).await?;

        let mut submission =
            JudgeSubmission::new(token, language_id, run.time_limit, self.poll_interval);
        let started = Instant::now();

        loop {
            if submission.exhausted() {
                log::warn!(
                    "Submission {} (language {}) still pending after {} polls since {}, abandoning",
                    submission.token,
                    submission.language_id,
                    submission.poll_attempts,
                    submission.created_at
                );
                return Ok(ExecutionResult::timeout(started.elapsed()));
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Submission {} cancelled, polling stopped", submission.token);
                    bail!("submission cancelled before completion")
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            submission.poll_attempts += 1;
            let report = self.fetch_report(&submission.token).await?;

            let Some(outcome) = outcome_for_status(report.status.id) else {
                log::debug!(
                    "Submission {} still pending (status {}), poll {}/{}",
                    submission.token,
                    report.status.id,
                    submission.poll_attempts,
                    submission.max_polls
                );
                continue;
            };

            return Ok(normalize_report(outcome, report, started.elapsed()));
        }
    }
}

/// Flattens the service's nullable output fields into the result contract.
fn normalize_report(
    outcome: Outcome,
    report: SubmissionReport,
    elapsed: Duration,
) -> ExecutionResult {
    let stdout = report.stdout.unwrap_or_default();
    let stderr = match outcome {
        Outcome::CompileError => report
            .compile_output
            .or(report.message)
            .unwrap_or_default(),
        Outcome::RuntimeError | Outcome::InternalError => {
            report.stderr.or(report.message).unwrap_or_default()
        }
        Outcome::Success | Outcome::Timeout => report.stderr.unwrap_or_default(),
    };

    ExecutionResult {
        outcome,
        stdout,
        stderr,
        duration_ms: elapsed.as_millis() as u64,
    }
}
