//! `crsctl` driver: cluster stack health check.
//!
//! `crsctl check crs` reports one line per clusterware daemon:
//!
//! ```text
//! CRS-4638: Oracle High Availability Services is online
//! CRS-4537: Cluster Ready Services is online
//! CRS-4529: Cluster Synchronization Services is online
//! CRS-4533: Event Manager is online
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec, ExecError};

#[derive(Debug, Error)]
pub enum CrsctlError {
    #[error("crsctl invocation failed: {0}")]
    Exec(#[from] ExecError),
    #[error("unrecognized crsctl output: {context}")]
    Parse { context: String },
}

/// Health of one clusterware service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub online: bool,
}

/// Parsed `crsctl check crs` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackHealth {
    pub services: Vec<ServiceHealth>,
}

impl StackHealth {
    /// True when every reported service is online (and at least one was
    /// reported at all).
    pub fn healthy(&self) -> bool {
        !self.services.is_empty() && self.services.iter().all(|s| s.online)
    }

    /// Names of services that are not online.
    pub fn offline(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| !s.online)
            .map(|s| s.service.as_str())
            .collect()
    }
}

fn service_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^CRS-\d+: (.+?) is (online|offline)").expect("static regex")
    })
}

/// Parse `crsctl check crs` output.
pub fn parse_check(output: &str) -> Result<StackHealth, CrsctlError> {
    let mut services = Vec::new();
    for line in output.lines() {
        if let Some(caps) = service_line_re().captures(line.trim()) {
            services.push(ServiceHealth {
                service: caps[1].to_string(),
                online: &caps[2] == "online",
            });
        }
    }
    if services.is_empty() {
        return Err(CrsctlError::Parse {
            context: output.lines().next().unwrap_or("<empty>").to_string(),
        });
    }
    Ok(StackHealth { services })
}

/// Run `crsctl check crs` through `runner`.
///
/// `crsctl` exits non-zero when any daemon is down but still prints the
/// per-service lines, so the output is parsed regardless of exit code.
pub async fn check_crs<R: CommandRunner>(runner: &R) -> Result<StackHealth, CrsctlError> {
    let output = runner
        .run(CommandSpec::new("crsctl").args(["check", "crs"]))
        .await?;
    parse_check(&output.stdout)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::test_support::ScriptedRunner;

    const ALL_ONLINE: &str = "\
CRS-4638: Oracle High Availability Services is online
CRS-4537: Cluster Ready Services is online
CRS-4529: Cluster Synchronization Services is online
CRS-4533: Event Manager is online
";

    const CRS_DOWN: &str = "\
CRS-4638: Oracle High Availability Services is online
CRS-4535: Cannot communicate with Cluster Ready Services
CRS-4529: Cluster Synchronization Services is online
CRS-4533: Event Manager is offline
";

    #[test]
    fn all_online_is_healthy() {
        let health = parse_check(ALL_ONLINE).expect("parse");
        assert_eq!(health.services.len(), 4);
        assert!(health.healthy());
        assert!(health.offline().is_empty());
    }

    #[test]
    fn offline_service_is_unhealthy() {
        let health = parse_check(CRS_DOWN).expect("parse");
        // The "Cannot communicate" line has no online/offline verdict and
        // is skipped; Event Manager is explicitly offline.
        assert_eq!(health.services.len(), 3);
        assert!(!health.healthy());
        assert_eq!(health.offline(), vec!["Event Manager"]);
    }

    #[test]
    fn no_service_lines_is_parse_error() {
        let err = parse_check("command not found\n").expect_err("must fail");
        assert!(matches!(err, CrsctlError::Parse { .. }));
    }

    #[tokio::test]
    async fn check_crs_tolerates_nonzero_exit() {
        let runner = ScriptedRunner::new();
        runner.push_output(crate::exec::CommandOutput {
            stdout: CRS_DOWN.into(),
            stderr: String::new(),
            exit_code: 1,
            duration_ms: 10,
        });
        let health = check_crs(&runner).await.expect("check");
        assert!(!health.healthy());
        assert_eq!(runner.call_line(0), "crsctl check crs");
    }
}
