use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{LanguageBackend, LanguageConfig, LimitsConfig};
use crate::exec::{ExecutionRequest, ExecutionResult, Outcome, RunError};

/// One run, resolved against the language table and ready for a backend.
pub struct PreparedRun<'a> {
    pub language: &'a LanguageConfig,
    pub source_code: &'a str,
    pub stdin: &'a str,
    pub time_limit: Duration,
}

/// Trait for the pluggable execution backends
///
/// Each backend turns a prepared run into exactly one `ExecutionResult`,
/// encoding program failures as outcomes. An `Err` return means the backend
/// itself faulted (spawn failure, unreachable judge, cancellation) and the
/// dispatcher decides what the caller sees.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    async fn execute(
        &self,
        run: &PreparedRun<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult>;
}

/// Routes each request to the single strategy serving its language and owns
/// the uniform result contract: user-code faults come back as outcomes,
/// platform faults as `InternalError` results, and only preview-only
/// languages are refused outright.
pub struct Dispatcher {
    languages: Vec<LanguageConfig>,
    local: Arc<dyn ExecutionStrategy>,
    judge: Arc<dyn ExecutionStrategy>,
    limits: LimitsConfig,
}

impl Dispatcher {
    pub fn new(
        languages: Vec<LanguageConfig>,
        local: Arc<dyn ExecutionStrategy>,
        judge: Arc<dyn ExecutionStrategy>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            languages,
            local,
            judge,
            limits,
        }
    }

    pub fn language(&self, name: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|l| l.name == name)
    }

    pub fn languages(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// Runs a request to completion. Never returns an error for a fault in
    /// the submitted code; see `RunError` for the only refusal cases.
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult, RunError> {
        self.run_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Like `run`, but abandons the backend as soon as `cancel` fires. A
    /// cancelled run yields an `InternalError` result the caller is expected
    /// to discard rather than surface.
    pub async fn run_cancellable(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, RunError> {
        if request.source_code.trim().is_empty() {
            return Ok(ExecutionResult::internal_error(
                "empty source code submitted",
            ));
        }

        let Some(language) = self.language(&request.language) else {
            log::warn!("Run request for unsupported language {}", request.language);
            return Ok(ExecutionResult::internal_error(format!(
                "unsupported language: {}",
                request.language
            )));
        };

        let time_limit = match self.resolve_time_limit(request.time_limit_ms) {
            Ok(limit) => limit,
            Err(message) => return Ok(ExecutionResult::internal_error(message)),
        };

        let strategy = match &language.backend {
            LanguageBackend::Local { .. } => self.local.as_ref(),
            LanguageBackend::Judge { .. } => self.judge.as_ref(),
            LanguageBackend::Preview => {
                return Err(RunError::PreviewOnly(language.name.clone()));
            }
        };

        let run = PreparedRun {
            language,
            source_code: &request.source_code,
            stdin: request.stdin.as_deref().unwrap_or(""),
            time_limit,
        };

        let started = Instant::now();
        match strategy.execute(&run, cancel).await {
            Ok(result) => {
                log::debug!(
                    "Run for language {} finished with outcome {:?} in {} ms",
                    language.name,
                    result.outcome,
                    result.duration_ms
                );
                Ok(result)
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    // Expected when a newer request superseded this one; the
                    // caller discards the placeholder result.
                    log::debug!("Run for language {} cancelled: {e:#}", language.name);
                } else {
                    log::error!(
                        "Execution backend failed for language {}: {e:#}",
                        language.name
                    );
                }
                Ok(ExecutionResult {
                    outcome: Outcome::InternalError,
                    stdout: String::new(),
                    stderr: format!("{e:#}"),
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Applies the configured default and rejects out-of-bounds limits.
    fn resolve_time_limit(&self, requested_ms: Option<u64>) -> Result<Duration, String> {
        let ms = requested_ms.unwrap_or(self.limits.default_time_limit_ms);
        if ms == 0 {
            return Err("time limit must be greater than zero".to_string());
        }
        if ms > self.limits.max_time_limit_ms {
            return Err(format!(
                "time limit {ms} ms exceeds the ceiling of {} ms",
                self.limits.max_time_limit_ms
            ));
        }
        Ok(Duration::from_millis(ms))
    }
}
