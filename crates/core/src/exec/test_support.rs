//! Scripted [`CommandRunner`] fake for driver tests.
//!
//! Tests push canned results in the order the code under test is expected
//! to invoke commands; every call pops the next result and records the
//! spec so assertions can check the exact argv that was built.

use std::sync::Mutex;

use super::{CommandOutput, CommandRunner, CommandSpec, ExecError};

pub(crate) struct ScriptedRunner {
    responses: Mutex<Vec<Result<CommandOutput, ExecError>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful invocation whose stdout is `stdout`.
    pub(crate) fn push_stdout(&self, stdout: &str) {
        self.push_output(CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 1,
        });
    }

    pub(crate) fn push_output(&self, output: CommandOutput) {
        self.responses
            .lock()
            .expect("responses lock")
            .push(Ok(output));
    }

    pub(crate) fn push_err(&self, err: ExecError) {
        self.responses
            .lock()
            .expect("responses lock")
            .push(Err(err));
    }

    /// Queue a run that exits non-zero with `stderr`.
    pub(crate) fn push_failure(&self, exit_code: i32, stderr: &str) {
        self.push_output(CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            duration_ms: 1,
        });
    }

    /// The specs recorded so far, oldest first.
    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Rendered `program arg…` line for call `idx`, for terse assertions.
    pub(crate) fn call_line(&self, idx: usize) -> String {
        let calls = self.calls.lock().expect("calls lock");
        let spec = calls.get(idx).expect("call index in range");
        let mut line = spec.program.clone();
        for arg in &spec.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().expect("calls lock").push(spec);
        let mut responses = self.responses.lock().expect("responses lock");
        assert!(
            !responses.is_empty(),
            "ScriptedRunner ran out of queued responses",
        );
        responses.remove(0)
    }
}
