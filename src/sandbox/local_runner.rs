use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::LanguageBackend;
use crate::dispatch::{ExecutionStrategy, PreparedRun};
use crate::exec::{ExecutionResult, Outcome};

/// Runs script-like languages in an isolated local subprocess
///
/// Each run gets a fresh temporary work directory, a cleared environment
/// (only PATH passes through), and piped stdio. The child's stdout pipe is
/// the captured print sink: it cannot outlive the process, so no global
/// output state ever needs restoring. The time limit is enforced with a
/// hard kill, which is the only thing that reliably stops an infinite loop
/// in user code.
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        log::info!("LocalRunner initialized (subprocess sandbox, hard-kill timeouts)");
        Self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStrategy for LocalRunner {
    async fn execute(
        &self,
        run: &PreparedRun<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let LanguageBackend::Local { file_name, command } = &run.language.backend else {
            bail!(
                "local runner invoked for non-local language {}",
                run.language.name
            );
        };

        let work_dir =
            tempfile::tempdir().context("failed to create sandbox work directory")?;
        let source_path = work_dir.path().join(file_name);
        fs::write(&source_path, format!("{}\n", run.source_code))
            .context("failed to write source file")?;

        let command = render_command(command, &source_path)?;
        log::debug!(
            "Running {} in {} via {:?}",
            run.language.name,
            work_dir.path().display(),
            command
        );

        let mut cmd = tokio::process::Command::new(&command[0]);
        cmd.args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(work_dir.path())
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", command[0]))?;

        let stdin_pipe = child.stdin.take();

        // The stdin write runs under the same deadline as the wait: a child
        // that never reads a large payload must still be killed on time.
        let run_child = async {
            let (fed, waited) =
                tokio::join!(feed_stdin(stdin_pipe, run.stdin), child.wait_with_output());
            fed.context("failed to write stdin to sandboxed process")?;
            waited.context("failed waiting for sandboxed process")
        };

        let started = Instant::now();
        tokio::select! {
            _ = cancel.cancelled() => {
                // Dropping the child here kills it (kill_on_drop).
                log::debug!("Local run for {} cancelled", run.language.name);
                bail!("run cancelled before completion")
            }
            waited = timeout(run.time_limit, run_child) => {
                let elapsed = started.elapsed();
                match waited {
                    Ok(Ok(output)) => {
                        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                        if output.status.success() {
                            Ok(ExecutionResult {
                                outcome: Outcome::Success,
                                stdout,
                                stderr,
                                duration_ms: elapsed.as_millis() as u64,
                            })
                        } else {
                            let stderr = if stderr.is_empty() {
                                format!("process exited with code {:?}", output.status.code())
                            } else {
                                stderr
                            };
                            Ok(ExecutionResult {
                                outcome: Outcome::RuntimeError,
                                stdout,
                                stderr,
                                duration_ms: elapsed.as_millis() as u64,
                            })
                        }
                    }
                    Ok(Err(e)) => Err(e),
                    Err(_) => {
                        log::info!(
                            "Local run for {} exceeded its {} ms limit, killing",
                            run.language.name,
                            run.time_limit.as_millis()
                        );
                        Ok(ExecutionResult::timeout(elapsed))
                    }
                }
            }
        }
    }
}

/// Feeds the request's stdin to the child, then closes the pipe.
///
/// A child is free to exit without reading its stdin; the resulting broken
/// pipe is not a fault, the child's exit status decides the verdict.
async fn feed_stdin(
    pipe: Option<tokio::process::ChildStdin>,
    payload: &str,
) -> std::io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    if let Err(e) = pipe.write_all(payload.as_bytes()).await {
        return match e.kind() {
            ErrorKind::BrokenPipe => Ok(()),
            _ => Err(e),
        };
    }
    match pipe.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

/// Renders the configured command template against the written source path.
fn render_command(template: &[String], source_path: &Path) -> Result<Vec<String>> {
    if template.is_empty() {
        bail!("empty run command for language");
    }

    let source = source_path.to_string_lossy();
    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", source.as_ref());

    let command: Vec<String> = template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect();

    Ok(command)
}
