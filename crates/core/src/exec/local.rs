//! Local subprocess transport.
//!
//! [`run_command`] is the shared spawn + I/O + timeout logic; the ssh
//! transport builds its own `tokio::process::Command` and delegates the
//! actual execution here.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use super::{CommandOutput, CommandRunner, CommandSpec, ExecError};

/// Transport that spawns the program directly on this host.
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        run_command(&mut cmd, spec).await
    }
}

/// Spawn `cmd`, write the stdin payload, capture stdout/stderr (capped at
/// the spec's `max_output_bytes` each), and enforce the configured timeout.
///
/// The caller sets the program and arguments; environment variables from
/// the spec are applied here. `kill_on_drop(true)` ensures the child is
/// killed when dropped (e.g. on timeout).
pub(super) async fn run_command(
    cmd: &mut Command,
    spec: CommandSpec,
) -> Result<CommandOutput, ExecError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExecError::NotFound(spec.program.clone())
        } else {
            ExecError::Io(e)
        }
    })?;

    // Write the payload to stdin, then close it so line-oriented tools
    // (sqlplus in particular) see EOF and terminate.
    if let Some(mut stdin) = child.stdin.take() {
        if let Some(payload) = &spec.stdin {
            // Best-effort write; if the process closes stdin early, ignore it.
            let _ = stdin.write_all(payload.as_bytes()).await;
        }
        drop(stdin);
    }

    // Read both streams in spawned tasks so we can still call
    // `child.wait()` (which borrows `&mut child`).
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let cap = spec.max_output_bytes;
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle, cap).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle, cap).await });

    let wait_result = tokio::time::timeout(spec.timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
            let exit_code = status.code().unwrap_or(-1);

            tracing::debug!(
                program = %spec.program,
                exit_code,
                duration_ms,
                "Command finished",
            );

            Ok(CommandOutput {
                stdout,
                stderr,
                exit_code,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ExecError::Io(e)),
        Err(_elapsed) => {
            // Timeout expired. `child` is dropped here, which kills the
            // process because we set `kill_on_drop(true)`.
            tracing::warn!(
                program = %spec.program,
                timeout_ms = spec.timeout.as_millis() as u64,
                "Command timed out",
            );
            Err(ExecError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at `cap` bytes.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, cap: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(cap as u64).read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
