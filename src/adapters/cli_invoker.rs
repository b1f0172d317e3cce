//! Runs the agent CLI as a child process.
//!
//! The prompt travels as the last argument, encoded as `{"prompt": ...}`, so
//! no shell ever sees it. Output is captured up to [`MAX_OUTPUT_BYTES`] per
//! pipe and the child is killed on timeout or when a stream consumer goes away.

use crate::config::AgentSettings;
use crate::domain::ports::{AgentInvoker, AgentOutput};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// 10 MiB per pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct CliInvoker {
    settings: AgentSettings,
}

impl CliInvoker {
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    fn command(&self, prompt: &str) -> Command {
        let payload = serde_json::json!({ "prompt": prompt }).to_string();

        let mut cmd = Command::new(&self.settings.command);
        cmd.args(&self.settings.args)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.settings.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn(&self, prompt: &str) -> Result<Child> {
        tracing::debug!(
            command = %self.settings.command,
            prompt_chars = prompt.len(),
            "Spawning agent CLI"
        );
        self.command(prompt)
            .spawn()
            .map_err(|e| RelayError::AgentInvocationFailed {
                details: format!("failed to start '{}': {}", self.settings.command, e),
            })
    }
}

#[async_trait]
impl AgentInvoker for CliInvoker {
    async fn invoke(&self, prompt: &str) -> Result<AgentOutput> {
        let start = Instant::now();
        let mut child = self.spawn(prompt)?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_capped(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        // On timeout `child` is dropped and killed.
        match tokio::time::timeout(self.settings.timeout(), child.wait()).await {
            Ok(Ok(status)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                if stdout.truncated || stderr.truncated {
                    tracing::warn!(duration_ms, "Agent CLI output exceeded the cap");
                    return Err(output_exceeded());
                }
                let stdout = String::from_utf8_lossy(&stdout.bytes).into_owned();
                let stderr = String::from_utf8_lossy(&stderr.bytes).into_owned();

                if !status.success() {
                    return Err(exit_failure(status, &stderr));
                }
                if !stderr.trim().is_empty() {
                    tracing::warn!(stderr = %stderr.trim(), "Agent CLI wrote to stderr");
                }
                tracing::info!(duration_ms, stdout_bytes = stdout.len(), "Agent CLI finished");

                Ok(AgentOutput {
                    stdout,
                    stderr,
                    duration_ms,
                })
            }
            Ok(Err(e)) => Err(RelayError::IoError(e)),
            Err(_elapsed) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(elapsed_ms, "Agent CLI timed out");
                Err(RelayError::AgentTimeout { elapsed_ms })
            }
        }
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let start = Instant::now();
        let mut child = self.spawn(prompt)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::AgentInvocationFailed {
                details: "agent stdout is not captured".to_string(),
            })?;
        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let timeout = self.settings.timeout();

        tokio::spawn(async move {
            let pumped = tokio::time::timeout(timeout, pump_lines(&mut child, stdout, stderr_task, &tx)).await;
            let failure = match pumped {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(_elapsed) => Some(RelayError::AgentTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }),
            };
            if let Some(e) = failure {
                tracing::warn!(error = %e, "Agent stream ended with an error");
                let _ = tx.send(Err(e)).await;
            }
            // Dropping `child` here kills it if it is still running.
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Forward stdout lines until EOF, then check the exit status.
async fn pump_lines(
    child: &mut Child,
    stdout: ChildStdout,
    stderr_task: JoinHandle<CappedOutput>,
    tx: &mpsc::Sender<Result<String>>,
) -> Result<()> {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let next = tokio::select! {
            line = lines.next_line() => line?,
            _ = tx.closed() => {
                tracing::debug!("Stream consumer went away, stopping agent");
                return Ok(());
            }
        };
        let Some(line) = next else { break };
        if tx.send(Ok(line)).await.is_err() {
            tracing::debug!("Stream consumer went away, stopping agent");
            return Ok(());
        }
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        let stderr = stderr_task.await.unwrap_or_default();
        Err(exit_failure(status, &String::from_utf8_lossy(&stderr.bytes)))
    }
}

fn exit_failure(status: ExitStatus, stderr: &str) -> RelayError {
    let stderr = stderr.trim();
    let details = if stderr.is_empty() {
        format!("agent exited with {}", status)
    } else {
        stderr.to_string()
    };
    RelayError::AgentInvocationFailed { details }
}

fn output_exceeded() -> RelayError {
    RelayError::AgentInvocationFailed {
        details: format!("agent output exceeded {} MiB", MAX_OUTPUT_BYTES / (1024 * 1024)),
    }
}

#[derive(Debug, Default)]
struct CappedOutput {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read up to [`MAX_OUTPUT_BYTES`]. One extra byte is read to tell a full
/// pipe from an overflowing one.
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> CappedOutput {
    let mut bytes = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .await;
    }
    let truncated = bytes.len() > MAX_OUTPUT_BYTES;
    bytes.truncate(MAX_OUTPUT_BYTES);
    CappedOutput { bytes, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Run `body` with `sh`; the JSON payload arrives as `$1`.
    fn script(body: &str) -> (NamedTempFile, CliInvoker) {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        let invoker = CliInvoker::new(AgentSettings {
            command: "sh".to_string(),
            args: vec![file.path().display().to_string()],
            working_dir: None,
            timeout_secs: 5,
        });
        (file, invoker)
    }

    #[tokio::test]
    async fn test_invoke_passes_prompt_as_json_argument() {
        let (_file, invoker) = script(r#"printf '%s\n' "$1""#);
        let output = invoker.invoke("it's \"quoted\" $HOME").await.unwrap();

        let echoed: serde_json::Value = serde_json::from_str(output.stdout.trim()).unwrap();
        assert_eq!(echoed["prompt"], "it's \"quoted\" $HOME");
    }

    #[tokio::test]
    async fn test_invoke_reports_stderr_on_failure() {
        let (_file, invoker) = script("echo 'credentials expired' >&2\nexit 3");
        let err = invoker.invoke("hello").await.unwrap_err();
        match err {
            RelayError::AgentInvocationFailed { details } => assert_eq!(details, "credentials expired"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let invoker = CliInvoker::new(AgentSettings {
            command: "definitely-not-an-agent-cli".to_string(),
            ..Default::default()
        });
        let err = invoker.invoke("hello").await.unwrap_err();
        assert!(matches!(err, RelayError::AgentInvocationFailed { .. }));
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let (_file, mut invoker) = script("sleep 5");
        invoker.settings.timeout_secs = 1;
        let err = invoker.invoke("hello").await.unwrap_err();
        assert!(matches!(err, RelayError::AgentTimeout { .. }));
    }

    #[tokio::test]
    async fn test_stream_yields_lines_in_order() {
        let (_file, invoker) = script("echo 'data: one'\necho 'data: two'");
        let lines: Vec<String> = invoker
            .stream("hello")
            .await
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["data: one", "data: two"]);
    }

    #[tokio::test]
    async fn test_stream_ends_with_error_on_bad_exit() {
        let (_file, invoker) = script("echo partial\necho 'boom' >&2\nexit 1");
        let items: Vec<Result<String>> = invoker.stream("hello").await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(
            &items[1],
            Err(RelayError::AgentInvocationFailed { details }) if details == "boom"
        ));
    }

    #[tokio::test]
    async fn test_invoke_rejects_output_over_the_cap() {
        let (_file, invoker) = script("head -c 12000000 /dev/zero");
        let err = invoker.invoke("hello").await.unwrap_err();
        match err {
            RelayError::AgentInvocationFailed { details } => {
                assert_eq!(details, "agent output exceeded 10 MiB")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_accepts_output_at_the_cap() {
        let (_file, invoker) = script(&format!("head -c {} /dev/zero", MAX_OUTPUT_BYTES));
        let output = invoker.invoke("hello").await.unwrap();
        assert_eq!(output.stdout.len(), MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn test_dropping_stream_kills_agent() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let (_file, invoker) = script(&format!(
            "echo first\nsleep 2\ntouch '{}'",
            marker.display()
        ));

        let mut lines = invoker.stream("hello").await.unwrap();
        assert_eq!(lines.next().await.unwrap().unwrap(), "first");
        drop(lines);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }
}
