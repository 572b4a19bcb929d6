//! Subprocess execution with a wall-clock limit and capped output.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to spawn script: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("script I/O failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("script exceeded {0:?}")]
    Timeout(Duration),

    #[error("script output exceeded {0} bytes")]
    Overflow(usize),

    #[error("script exited with {0}")]
    Exit(ExitStatus),

    #[error("script produced no output")]
    NoOutput,
}

/// One script invocation.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    /// Shell command line.
    pub command: String,
    pub cwd: PathBuf,
    /// Replaces the inherited environment when set.
    pub env: Option<HashMap<String, String>>,
    /// Bytes piped to the child's stdin.
    pub stdin: Bytes,
    pub timeout: Duration,
    /// Cap on each of stdout and stderr.
    pub max_buffer: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: Bytes,
    pub stderr: Bytes,
}

/// Injectable script execution.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, request: ScriptRequest) -> Result<ScriptOutput, ScriptError>;
}

/// Runs commands through the platform shell. The child is killed when the
/// run times out, overflows, or the request future is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl ScriptRunner for ShellRunner {
    async fn run(&self, request: ScriptRequest) -> Result<ScriptOutput, ScriptError> {
        let mut command = shell(&request.command);
        command
            .current_dir(&request.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(env) = &request.env {
            command.env_clear().envs(env);
        }

        let mut child = command.spawn().map_err(ScriptError::Spawn)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max = request.max_buffer;

        let work = async {
            let (_, stdout, stderr) = tokio::join!(
                write_input(stdin, &request.stdin),
                read_capped(stdout, max),
                read_capped(stderr, max),
            );
            let (stdout, stderr) = (stdout?, stderr?);
            let status = child.wait().await.map_err(ScriptError::Io)?;
            if !status.success() {
                return Err(ScriptError::Exit(status));
            }
            Ok::<_, ScriptError>(ScriptOutput {
                stdout: Bytes::from(stdout),
                stderr: Bytes::from(stderr),
            })
        };

        let outcome = tokio::time::timeout(request.timeout, work).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ScriptError::Timeout(request.timeout)),
        };
        if result.is_err() {
            let _ = child.start_kill();
        }
        result
    }
}

#[cfg(unix)]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

/// Scripts that never read stdin close the pipe early; that is not an error.
async fn write_input(stdin: Option<ChildStdin>, input: &[u8]) {
    if let Some(mut stdin) = stdin {
        if !input.is_empty() {
            let _ = stdin.write_all(input).await;
        }
        let _ = stdin.shutdown().await;
    }
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, max: usize) -> Result<Vec<u8>, ScriptError> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    reader
        .take(max as u64 + 1)
        .read_to_end(&mut buf)
        .await
        .map_err(ScriptError::Io)?;
    if buf.len() > max {
        return Err(ScriptError::Overflow(max));
    }
    Ok(buf)
}
