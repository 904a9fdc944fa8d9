//! RAC One Node online relocation workflow.
//!
//! Sequences the full move of a RAC One Node database to another cluster
//! node: preflight checks, the `srvctl relocate` command itself, status
//! polling with capped backoff until the database lands on the target,
//! and an optional open-mode verification through sqlplus. Each stage
//! fails with its own [`RelocateError`] variant so operators can tell a
//! bad request from a mid-flight failure.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::crsctl::{self, CrsctlError};
use super::srvctl::{self, DatabaseState, DatabaseType, SrvctlError};
use crate::exec::{CommandRunner, ExecError};
use crate::jsonpath;
use crate::sqljson::{self, SqlJsonError, SqlQuery};

/// A relocation order: which database, where to, and how carefully.
#[derive(Debug, Clone)]
pub struct RelocateRequest {
    pub database: String,
    pub target_node: String,
    /// Passed to `srvctl relocate -w`: minutes existing sessions get to
    /// drain before the source instance is stopped.
    pub timeout_minutes: u32,
    /// Query `v$database` open mode on success.
    pub verify: bool,
    /// Open mode required when `verify` is set.
    pub expected_open_mode: String,
}

impl RelocateRequest {
    pub fn new(database: impl Into<String>, target_node: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            target_node: target_node.into(),
            timeout_minutes: 30,
            verify: true,
            expected_open_mode: "READ WRITE".to_string(),
        }
    }
}

/// Tunable parameters for the post-relocate status polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second status check; grows from here.
    pub interval: Duration,
    /// Upper bound on the delay between checks.
    pub max_interval: Duration,
    /// Give up after this many status checks.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            max_attempts: 60,
        }
    }
}

impl PollConfig {
    /// Next delay: half again as long, clamped to `max_interval`.
    fn next_interval(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * 1.5) as u64;
        Duration::from_millis(next_ms).min(self.max_interval)
    }
}

/// Where the database ended up.
#[derive(Debug, Clone, Serialize)]
pub struct RelocateOutcome {
    /// False when the database was already on the target node.
    pub relocated: bool,
    pub instance: String,
    pub node: String,
    /// Status checks spent in the polling loop.
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("database type is {found}, not RAC One Node")]
    NotRacOneNode { found: String },
    #[error("node '{node}' is not a candidate server (candidates: {candidates})")]
    NotCandidate { node: String, candidates: String },
    #[error("clusterware stack is not healthy (offline: {offline})")]
    StackDown { offline: String },
    #[error("database '{database}' is not running; online relocation requires a running instance")]
    DatabaseDown { database: String },
    #[error("srvctl relocate command failed: {0}")]
    RelocateCommand(ExecError),
    #[error("database did not reach the target node after {attempts} status checks")]
    PollTimeout { attempts: u32 },
    #[error("relocation cancelled")]
    Cancelled,
    #[error("open mode verification failed: expected '{expected}', got '{actual}'")]
    VerifyFailed { expected: String, actual: String },
    #[error(transparent)]
    Srvctl(#[from] SrvctlError),
    #[error(transparent)]
    Crsctl(#[from] CrsctlError),
    #[error("open mode verification query failed: {0}")]
    Verify(#[from] SqlJsonError),
}

/// Relocate `request.database` to `request.target_node`.
///
/// `runner` must execute on a host where `srvctl`/`crsctl` (and, for
/// verification, `sqlplus` against the relocated instance) are available;
/// for a remote cluster that is an [`crate::exec::SshRunner`] pointed at
/// the target node.
pub async fn relocate<R: CommandRunner>(
    runner: &R,
    request: &RelocateRequest,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<RelocateOutcome, RelocateError> {
    // Preflight: the request must make sense before anything moves.
    let config = srvctl::config_database(runner, &request.database).await?;
    if config.database_type != DatabaseType::RacOneNode {
        return Err(RelocateError::NotRacOneNode {
            found: config.database_type.to_string(),
        });
    }
    if !config
        .candidate_servers
        .iter()
        .any(|s| s == &request.target_node)
    {
        return Err(RelocateError::NotCandidate {
            node: request.target_node.clone(),
            candidates: config.candidate_servers.join(","),
        });
    }

    let stack = crsctl::check_crs(runner).await?;
    if !stack.healthy() {
        return Err(RelocateError::StackDown {
            offline: stack.offline().join(","),
        });
    }

    let status = srvctl::status_database(runner, &request.database).await?;
    let DatabaseState::Running { instance, node } = status.state else {
        return Err(RelocateError::DatabaseDown {
            database: request.database.clone(),
        });
    };

    if node == request.target_node {
        tracing::info!(
            database = %request.database,
            node = %node,
            "Database already on target node; nothing to relocate",
        );
        return Ok(RelocateOutcome {
            relocated: false,
            instance,
            node,
            attempts: 0,
        });
    }

    tracing::info!(
        database = %request.database,
        from = %node,
        to = %request.target_node,
        timeout_minutes = request.timeout_minutes,
        "Starting online relocation",
    );

    srvctl::relocate_database(
        runner,
        &request.database,
        &request.target_node,
        request.timeout_minutes,
    )
    .await
    .map_err(|e| match e {
        SrvctlError::Exec(exec) => RelocateError::RelocateCommand(exec),
        other => RelocateError::Srvctl(other),
    })?;

    let (instance, attempts) = poll_until_on_target(runner, request, poll, cancel).await?;

    if request.verify {
        verify_open_mode(runner, request, &config.oracle_home, &instance).await?;
    }

    tracing::info!(
        database = %request.database,
        node = %request.target_node,
        attempts,
        "Relocation complete",
    );
    Ok(RelocateOutcome {
        relocated: true,
        instance,
        node: request.target_node.clone(),
        attempts,
    })
}

/// Poll `srvctl status` until the database runs on the target node.
///
/// A transient srvctl failure or a not-running window (the gap between
/// source stop and target start) consumes an attempt and keeps polling.
async fn poll_until_on_target<R: CommandRunner>(
    runner: &R,
    request: &RelocateRequest,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<(String, u32), RelocateError> {
    let mut delay = poll.interval;

    for attempt in 1..=poll.max_attempts {
        if cancel.is_cancelled() {
            return Err(RelocateError::Cancelled);
        }

        match srvctl::status_database(runner, &request.database).await {
            Ok(status) => {
                if let DatabaseState::Running { instance, node } = &status.state {
                    if node == &request.target_node && !status.relocation_active {
                        return Ok((instance.clone(), attempt));
                    }
                }
                tracing::info!(
                    database = %request.database,
                    attempt,
                    relocation_active = status.relocation_active,
                    "Waiting for relocation to finish",
                );
            }
            Err(e) => {
                tracing::warn!(
                    database = %request.database,
                    attempt,
                    error = %e,
                    "Status check failed during relocation; retrying",
                );
            }
        }

        if attempt == poll.max_attempts {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(RelocateError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        delay = poll.next_interval(delay);
    }

    Err(RelocateError::PollTimeout {
        attempts: poll.max_attempts,
    })
}

/// Require the relocated instance to report the expected open mode.
async fn verify_open_mode<R: CommandRunner>(
    runner: &R,
    request: &RelocateRequest,
    oracle_home: &str,
    instance: &str,
) -> Result<(), RelocateError> {
    let query = SqlQuery::new(
        "select open_mode from v$database",
        vec!["open_mode".to_string()],
    )
    .oracle_sid(instance)
    .oracle_home(oracle_home);

    let rows = sqljson::run_query(runner, &query).await?;
    let actual = jsonpath::extract(&rows, "[0].open_mode")
        .map(jsonpath::render_scalar)
        .unwrap_or_else(|_| "<no rows>".to_string());

    if actual != request.expected_open_mode {
        return Err(RelocateError::VerifyFailed {
            expected: request.expected_open_mode.clone(),
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::test_support::ScriptedRunner;

    const CONFIG_RAC_ONE: &str = "\
Database unique name: orcl
Oracle home: /u01/app/oracle/product/19.0.0/dbhome_1
Type: RACOneNode
Candidate servers: dbnode1,dbnode2
";

    const CONFIG_PLAIN_RAC: &str = "\
Database unique name: orcl
Oracle home: /u01/app/oracle/product/19.0.0/dbhome_1
Type: RAC
";

    const CRS_OK: &str = "\
CRS-4638: Oracle High Availability Services is online
CRS-4537: Cluster Ready Services is online
CRS-4529: Cluster Synchronization Services is online
CRS-4533: Event Manager is online
";

    const CRS_BAD: &str = "\
CRS-4638: Oracle High Availability Services is online
CRS-4533: Event Manager is offline
";

    fn status_on(node: &str) -> String {
        format!("Instance orcl_1 is running on node {node}\nOnline relocation: INACTIVE\n")
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_attempts: 5,
        }
    }

    fn request() -> RelocateRequest {
        RelocateRequest::new("orcl", "dbnode2")
    }

    #[test]
    fn poll_interval_grows_and_clamps() {
        let poll = PollConfig {
            interval: Duration::from_secs(4),
            max_interval: Duration::from_secs(8),
            max_attempts: 10,
        };
        assert_eq!(poll.next_interval(Duration::from_secs(4)), Duration::from_secs(6));
        assert_eq!(poll.next_interval(Duration::from_secs(6)), Duration::from_secs(8));
        assert_eq!(poll.next_interval(Duration::from_secs(8)), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn full_relocation_with_verify() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE); // config
        runner.push_stdout(CRS_OK); // crsctl check
        runner.push_stdout(&status_on("dbnode1")); // preflight status
        runner.push_stdout(""); // srvctl relocate
        runner.push_stdout(
            "Instance orcl_1 is running on node dbnode1\nOnline relocation: ACTIVE\n",
        ); // poll 1: still moving
        runner.push_stdout(&status_on("dbnode2")); // poll 2: landed
        runner.push_stdout("READ WRITE\n"); // verify query

        let outcome = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect("relocate");
        assert!(outcome.relocated);
        assert_eq!(outcome.node, "dbnode2");
        assert_eq!(outcome.instance, "orcl_1");
        assert_eq!(outcome.attempts, 2);

        assert_eq!(runner.call_line(0), "srvctl config database -d orcl");
        assert_eq!(runner.call_line(1), "crsctl check crs");
        assert_eq!(
            runner.call_line(3),
            "srvctl relocate database -d orcl -n dbnode2 -w 30"
        );
        assert_eq!(runner.calls().len(), 7);
    }

    #[tokio::test]
    async fn already_on_target_is_idempotent_success() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout(&status_on("dbnode2"));

        let outcome = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect("relocate");
        assert!(!outcome.relocated);
        assert_eq!(outcome.node, "dbnode2");
        // No relocate command, no polling, no verify.
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn rejects_non_rac_one_node() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_PLAIN_RAC);

        let err = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, RelocateError::NotRacOneNode { .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_candidate_target() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);

        let mut req = request();
        req.target_node = "dbnode9".into();
        let err = relocate(&runner, &req, &fast_poll(), &CancellationToken::new())
            .await
            .expect_err("must fail");
        match err {
            RelocateError::NotCandidate { node, candidates } => {
                assert_eq!(node, "dbnode9");
                assert_eq!(candidates, "dbnode1,dbnode2");
            }
            other => panic!("expected NotCandidate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_unhealthy_stack() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_BAD);

        let err = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect_err("must fail");
        match err {
            RelocateError::StackDown { offline } => assert_eq!(offline, "Event Manager"),
            other => panic!("expected StackDown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_stopped_database() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout("Database orcl is not running.\n");

        let err = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, RelocateError::DatabaseDown { .. }));
    }

    #[tokio::test]
    async fn poll_timeout_after_max_attempts() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout(&status_on("dbnode1"));
        runner.push_stdout(""); // relocate command
        for _ in 0..2 {
            runner.push_stdout(&status_on("dbnode1")); // never moves
        }

        let poll = PollConfig {
            max_attempts: 2,
            ..fast_poll()
        };
        let err = relocate(&runner, &request(), &poll, &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert_matches::assert_matches!(err, RelocateError::PollTimeout { attempts: 2 });
    }

    #[tokio::test]
    async fn transient_status_failure_keeps_polling() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout(&status_on("dbnode1"));
        runner.push_stdout(""); // relocate command
        runner.push_failure(1, "PRCD-1120 : transient"); // poll 1 fails
        runner.push_stdout(&status_on("dbnode2")); // poll 2 lands

        let mut req = request();
        req.verify = false;
        let outcome = relocate(&runner, &req, &fast_poll(), &CancellationToken::new())
            .await
            .expect("relocate");
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_polling() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout(&status_on("dbnode1"));
        runner.push_stdout(""); // relocate command

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = relocate(&runner, &request(), &fast_poll(), &cancel)
            .await
            .expect_err("must fail");
        assert!(matches!(err, RelocateError::Cancelled));
        // Cancellation observed before any poll status check ran.
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn verify_failure_reports_actual_mode() {
        let runner = ScriptedRunner::new();
        runner.push_stdout(CONFIG_RAC_ONE);
        runner.push_stdout(CRS_OK);
        runner.push_stdout(&status_on("dbnode1"));
        runner.push_stdout(""); // relocate command
        runner.push_stdout(&status_on("dbnode2")); // poll 1 lands
        runner.push_stdout("MOUNTED\n"); // verify query

        let err = relocate(&runner, &request(), &fast_poll(), &CancellationToken::new())
            .await
            .expect_err("must fail");
        match err {
            RelocateError::VerifyFailed { expected, actual } => {
                assert_eq!(expected, "READ WRITE");
                assert_eq!(actual, "MOUNTED");
            }
            other => panic!("expected VerifyFailed, got {other:?}"),
        }
    }
}
