//! Subprocess execution layer.
//!
//! Every vendor tool this crate touches (`ps`, `sqlplus`, `srvctl`,
//! `crsctl`) is invoked through the [`CommandRunner`] trait so that the
//! higher layers can be driven either locally, over ssh, or by a scripted
//! fake in tests. [`LocalRunner`] spawns directly on this host;
//! [`SshRunner`] prefixes the same invocation with a non-interactive
//! `ssh` transport.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

mod local;
mod remote;

#[cfg(test)]
pub(crate) mod test_support;

pub use local::LocalRunner;
pub use remote::SshRunner;

/// Default wall-clock budget for a single command invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-stream capture cap (1 MiB).
///
/// Output beyond the cap is truncated rather than treated as an error;
/// the tools wrapped here emit at most a few KiB on the happy path.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// One subprocess invocation: program, argv, environment, optional stdin
/// payload, and a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Additional environment variables set for the child process.
    pub env: Vec<(String, String)>,
    /// Payload written to the child's stdin before it is closed.
    pub stdin: Option<String>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
    /// Per-stream capture cap; output beyond it is silently truncated.
    pub max_output_bytes: usize,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_output_bytes(mut self, cap: usize) -> Self {
        self.max_output_bytes = cap;
        self
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Complete stdout, truncated at the spec's capture cap.
    pub stdout: String,
    /// Complete stderr, truncated at the spec's capture cap.
    pub stderr: String,
    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert a non-zero exit into [`ExecError::Failed`].
    pub fn require_success(self) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::Failed {
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Errors that can occur while running a subprocess.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program was not found on `PATH`.
    #[error("command not found: {0}")]
    NotFound(String),
    /// The process exceeded its configured timeout and was killed.
    #[error("command timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    /// The process ran but exited with a non-zero exit code.
    #[error("command failed with exit code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },
    /// An I/O error occurred while spawning or communicating with the process.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait implemented by all command transports (local spawn, ssh, test
/// fakes). Higher layers are generic over this seam.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion and capture its output.
    fn run(
        &self,
        spec: CommandSpec,
    ) -> impl Future<Output = Result<CommandOutput, ExecError>> + Send;
}

/// Runtime-selected transport: local spawn or ssh to a remote host.
pub enum Runner {
    Local(LocalRunner),
    Ssh(SshRunner),
}

impl CommandRunner for Runner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        match self {
            Self::Local(r) => r.run(spec).await,
            Self::Ssh(r) => r.run(spec).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
