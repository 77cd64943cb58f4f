use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::errors::AppError;
use crate::executor::stream::{OutputStream, Tag};

/// Captured result of a non-streamed invocation (`docker inspect`,
/// `docker ps`, existence probes).
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

async fn forward_lines<R>(reader: R, out: OutputStream, tag: Tag)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        out.line(tag, &line).await;
    }
}

/// Run a command, draining stdout and stderr concurrently into the tagged
/// stream. Both pipes are fully consumed before the exit status is
/// awaited. A non-zero exit emits `[ERROR]` and errors out; success ends
/// with the `[DONE]` marker.
pub async fn stream_command(
    out: &OutputStream,
    program: &str,
    args: &[String],
    stdin_doc: Option<String>,
    envs: &[(String, String)],
) -> Result<(), AppError> {
    let pretty = format!("{} {}", program, args.join(" "));
    tracing::debug!("Running {}", pretty);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin_doc.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            out.error(&format!("Failed to start {pretty}: {err}")).await;
            return Err(AppError::SubprocessFailure {
                command: pretty,
                code: -1,
            });
        }
    };

    if let Some(doc) = stdin_doc {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(doc.as_bytes()).await {
                    tracing::warn!("Could not write compose document to stdin: {}", err);
                }
            });
        }
    }

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");
    let out_task = tokio::spawn(forward_lines(stdout, out.clone(), Tag::Stdout));
    let err_task = tokio::spawn(forward_lines(stderr, out.clone(), Tag::Stderr));
    let _ = tokio::join!(out_task, err_task);

    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => {
            out.error(&format!("Failed to wait for {pretty}: {err}")).await;
            return Err(AppError::SubprocessFailure {
                command: pretty,
                code: -1,
            });
        }
    };

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        out.error(&format!("Command failed: {pretty} (exit code {code})"))
            .await;
        return Err(AppError::SubprocessFailure {
            command: pretty,
            code,
        });
    }

    out.done().await;
    Ok(())
}

/// Run a command to completion and capture its output without streaming.
pub async fn capture_command(program: &str, args: &[String]) -> Result<CommandOutput, AppError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AppError::fs(format!("spawn {program}"), e))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}
