//! Running Oracle instance discovery.
//!
//! An Oracle instance is visible on a host as its PMON background process:
//! `ora_pmon_<SID>` for databases, `asm_pmon_<SID>` for ASM (where the SID
//! starts with `+`), and `mdb_pmon_<SID>` for the grid management database.
//! Discovery lists the process table once and scans the command words for
//! those markers.

use serde::Serialize;
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec, ExecError};

/// Kind of instance behind a PMON process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Database,
    Asm,
    Management,
}

/// One running instance found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningInstance {
    pub sid: String,
    pub kind: InstanceKind,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list processes: {0}")]
    Ps(#[from] ExecError),
}

/// PMON marker prefixes, paired with the instance kind they identify.
const PMON_MARKERS: &[(&str, InstanceKind)] = &[
    ("ora_pmon_", InstanceKind::Database),
    ("asm_pmon_", InstanceKind::Asm),
    ("mdb_pmon_", InstanceKind::Management),
];

/// List the running Oracle instances on the host behind `runner`.
pub async fn discover<R: CommandRunner>(runner: &R) -> Result<Vec<RunningInstance>, DiscoveryError> {
    let output = runner
        .run(CommandSpec::new("ps").args(["-eo", "args="]))
        .await?
        .require_success()?;

    let instances = parse_ps_output(&output.stdout);
    tracing::debug!(count = instances.len(), "Instance discovery complete");
    Ok(instances)
}

/// Extract running instances from `ps -eo args=` output.
///
/// The marker must start the command word: a `grep ora_pmon` process or a
/// log path mentioning the marker mid-argument is not an instance.
/// Duplicates are collapsed and the result is sorted by SID.
pub fn parse_ps_output(output: &str) -> Vec<RunningInstance> {
    let mut instances: Vec<RunningInstance> = Vec::new();

    for line in output.lines() {
        let Some(command) = line.split_whitespace().next() else {
            continue;
        };
        for (marker, kind) in PMON_MARKERS {
            if let Some(sid) = command.strip_prefix(marker) {
                if sid.is_empty() {
                    continue;
                }
                let instance = RunningInstance {
                    sid: sid.to_string(),
                    kind: *kind,
                };
                if !instances.contains(&instance) {
                    instances.push(instance);
                }
            }
        }
    }

    instances.sort_by(|a, b| a.sid.cmp(&b.sid).then(a.kind.cmp(&b.kind)));
    instances
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
