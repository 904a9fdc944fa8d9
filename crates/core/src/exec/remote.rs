//! Remote subprocess transport over ssh.
//!
//! Wraps an invocation in `ssh -o BatchMode=yes … <host> -- <cmd>` so the
//! same [`CommandSpec`] that runs locally can run on another fleet host.
//! BatchMode forbids password prompts; key-based auth is assumed, as is
//! standard for fleet automation.

use std::time::Duration;

use tokio::process::Command;

use super::local::run_command;
use super::{CommandOutput, CommandRunner, CommandSpec, ExecError};

/// Transport that runs commands on a remote host through `ssh`.
#[derive(Debug, Clone)]
pub struct SshRunner {
    host: String,
    user: Option<String>,
    connect_timeout: Option<Duration>,
}

impl SshRunner {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            connect_timeout: None,
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The argv passed to the local `ssh` binary for `spec`.
    ///
    /// Environment variables from the spec are folded into the remote
    /// command line (`K=V … prog args`) because sshd does not forward
    /// arbitrary client environment by default.
    fn ssh_args(&self, spec: &CommandSpec) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(timeout) = self.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={}", timeout.as_secs().max(1)));
        }
        if let Some(user) = &self.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        args.push(self.host.clone());
        args.push("--".to_string());

        let mut words: Vec<String> = Vec::with_capacity(1 + spec.args.len() + spec.env.len());
        for (key, value) in &spec.env {
            words.push(format!("{key}={}", shell_quote(value)));
        }
        words.push(shell_quote(&spec.program));
        words.extend(spec.args.iter().map(|a| shell_quote(a)));
        args.push(words.join(" "));
        args
    }
}

impl CommandRunner for SshRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        tracing::debug!(
            host = %self.host,
            program = %spec.program,
            "Running command over ssh",
        );
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(&spec));
        // Program/args already live inside the ssh argv; the shared runner
        // only applies stdin and timeout from here on.
        let passthrough = CommandSpec {
            program: "ssh".to_string(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: spec.stdin,
            timeout: spec.timeout,
            max_output_bytes: spec.max_output_bytes,
        };
        run_command(&mut cmd, passthrough).await
    }
}

/// Quote one word for the remote shell.
///
/// Plain words (alphanumerics plus a few safe punctuation characters) pass
/// through unquoted; anything else is single-quoted with embedded single
/// quotes escaped as `'\''`.
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
