//! `srvctl` driver: status, config, and relocate subcommands.
//!
//! Output shapes handled here (Oracle 12c through 19c wording):
//!
//! ```text
//! $ srvctl status database -d orcl
//! Instance orcl_1 is running on node dbnode1
//! Online relocation: INACTIVE
//!
//! $ srvctl config database -d orcl
//! Database unique name: orcl
//! Oracle home: /u01/app/oracle/product/19.0.0/dbhome_1
//! Type: RACOneNode
//! Candidate servers: dbnode1,dbnode2
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec, ExecError};

#[derive(Debug, Error)]
pub enum SrvctlError {
    #[error("srvctl invocation failed: {0}")]
    Exec(#[from] ExecError),
    #[error("unrecognized srvctl output: {context}")]
    Parse { context: String },
}

/// Whether the database has a running instance, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DatabaseState {
    Running { instance: String, node: String },
    NotRunning,
}

/// Parsed `srvctl status database` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStatus {
    #[serde(flatten)]
    pub state: DatabaseState,
    /// True while an online relocation is in flight.
    pub relocation_active: bool,
}

impl DatabaseStatus {
    pub fn running_on(&self, node: &str) -> bool {
        matches!(&self.state, DatabaseState::Running { node: n, .. } if n == node)
    }
}

/// Management type reported by `srvctl config database`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    Rac,
    RacOneNode,
    SingleInstance,
    Other(String),
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rac => write!(f, "RAC"),
            Self::RacOneNode => write!(f, "RACOneNode"),
            Self::SingleInstance => write!(f, "SINGLE"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl DatabaseType {
    fn parse(s: &str) -> Self {
        match s {
            "RAC" => Self::Rac,
            "RACOneNode" => Self::RacOneNode,
            "SINGLE" => Self::SingleInstance,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Parsed `srvctl config database` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub db_unique_name: String,
    pub oracle_home: String,
    pub database_type: DatabaseType,
    /// Nodes eligible to host a RAC One Node database.
    pub candidate_servers: Vec<String>,
}

fn instance_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Instance (\S+) is running on node (\S+)").expect("static regex")
    })
}

/// Parse `srvctl status database -d <db>` output.
pub fn parse_status(output: &str) -> Result<DatabaseStatus, SrvctlError> {
    let mut state: Option<DatabaseState> = None;
    let mut relocation_active = false;

    for line in output.lines() {
        let line = line.trim();
        if let Some(caps) = instance_line_re().captures(line) {
            // RAC One Node has a single instance; first match wins.
            if state.is_none() {
                state = Some(DatabaseState::Running {
                    instance: caps[1].to_string(),
                    node: caps[2].to_string(),
                });
            }
        } else if line.contains("is not running") {
            state.get_or_insert(DatabaseState::NotRunning);
        } else if let Some(value) = line.strip_prefix("Online relocation: ") {
            relocation_active = value.trim() == "ACTIVE";
        }
    }

    let state = state.ok_or_else(|| SrvctlError::Parse {
        context: first_line(output),
    })?;
    Ok(DatabaseStatus {
        state,
        relocation_active,
    })
}

/// Parse `srvctl config database -d <db>` output.
pub fn parse_config(output: &str) -> Result<DatabaseConfig, SrvctlError> {
    let mut db_unique_name = None;
    let mut oracle_home = None;
    let mut database_type = None;
    let mut candidate_servers = Vec::new();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Database unique name" => db_unique_name = Some(value.to_string()),
            "Oracle home" => oracle_home = Some(value.to_string()),
            "Type" => database_type = Some(DatabaseType::parse(value)),
            "Candidate servers" => {
                candidate_servers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    let (Some(db_unique_name), Some(oracle_home)) = (db_unique_name, oracle_home) else {
        return Err(SrvctlError::Parse {
            context: first_line(output),
        });
    };

    Ok(DatabaseConfig {
        db_unique_name,
        oracle_home,
        // Older single-instance configs omit the Type line entirely.
        database_type: database_type.unwrap_or(DatabaseType::SingleInstance),
        candidate_servers,
    })
}

fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("<empty>").to_string()
}

/// Run `srvctl status database -d <database>` through `runner`.
pub async fn status_database<R: CommandRunner>(
    runner: &R,
    database: &str,
) -> Result<DatabaseStatus, SrvctlError> {
    let output = runner
        .run(CommandSpec::new("srvctl").args(["status", "database", "-d", database]))
        .await?
        .require_success()?;
    parse_status(&output.stdout)
}

/// Run `srvctl config database -d <database>` through `runner`.
pub async fn config_database<R: CommandRunner>(
    runner: &R,
    database: &str,
) -> Result<DatabaseConfig, SrvctlError> {
    let output = runner
        .run(CommandSpec::new("srvctl").args(["config", "database", "-d", database]))
        .await?
        .require_success()?;
    parse_config(&output.stdout)
}

/// Run `srvctl relocate database -d <database> -n <node> -w <minutes>`.
///
/// `-w` caps how long srvctl lets existing sessions drain before the old
/// instance is stopped. The subprocess timeout is set slightly above it.
pub async fn relocate_database<R: CommandRunner>(
    runner: &R,
    database: &str,
    target_node: &str,
    timeout_minutes: u32,
) -> Result<(), SrvctlError> {
    let spec = CommandSpec::new("srvctl")
        .args([
            "relocate",
            "database",
            "-d",
            database,
            "-n",
            target_node,
            "-w",
            &timeout_minutes.to_string(),
        ])
        .timeout(std::time::Duration::from_secs(u64::from(timeout_minutes) * 60 + 120));
    runner.run(spec).await?.require_success()?;
    tracing::info!(database, target_node, "srvctl relocate issued");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
