//! `orafleet` -- Oracle fleet operations CLI.
//!
//! Thin clap surface over `orafleet-core`: every subcommand builds a
//! transport (local spawn, or ssh when `--ssh-host` is given), calls the
//! corresponding core operation, and prints either human-oriented text or
//! machine JSON (`--json`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use orafleet_core::config::Settings;
use orafleet_core::exec::{LocalRunner, Runner, SshRunner};

pub mod commands;

/// A bad invocation rather than an operational failure.
///
/// `main` maps this to exit code 2, alongside clap's own usage errors;
/// everything else exits 1.
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

#[derive(Parser)]
#[command(name = "orafleet")]
#[command(about = "Oracle fleet operations: discovery, oratab, sqlplus-to-JSON, RAC One Node relocation")]
#[command(version)]
pub struct Cli {
    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Run the vendor tools on this host over ssh instead of locally.
    #[arg(long, global = true)]
    pub ssh_host: Option<String>,

    /// ssh login user for --ssh-host.
    #[arg(long, global = true)]
    pub ssh_user: Option<String>,

    /// ssh ConnectTimeout in seconds for --ssh-host.
    #[arg(long, global = true)]
    pub ssh_connect_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List running Oracle instances found in the process table.
    Discover,

    /// Run an arbitrary command through the selected transport.
    Run {
        /// Program and arguments, after `--`.
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Run a SQL query through sqlplus and print the rows as JSON.
    SqlJson {
        /// SQL statement projecting separator-delimited fields.
        #[arg(long)]
        query: String,
        /// JSON key per positional field, comma-separated.
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
        /// sqlplus connect string (default from ORAFLEET_SQLPLUS_CONNECT).
        #[arg(long)]
        connect: Option<String>,
        /// Field separator the query projects.
        #[arg(long, default_value_t = '|')]
        separator: char,
        /// ORACLE_SID for the sqlplus child process.
        #[arg(long)]
        oracle_sid: Option<String>,
        /// ORACLE_HOME for the sqlplus child process.
        #[arg(long)]
        oracle_home: Option<String>,
    },

    /// Extract a value from a JSON document by dotted path.
    JsonGet {
        /// Path like `database.instances[0].sid`; empty selects the root.
        #[arg(long, default_value = "")]
        path: String,
        /// Read the document from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Inspect or reconcile the oratab registry.
    Oratab {
        #[command(subcommand)]
        command: OratabCommand,
    },

    /// Show where a clusterware-managed database is running.
    Status {
        #[arg(short = 'd', long)]
        database: String,
    },

    /// Relocate a RAC One Node database to another cluster node.
    Relocate {
        #[arg(short = 'd', long)]
        database: String,
        /// Target node; must be a configured candidate server.
        #[arg(short = 'n', long)]
        node: String,
        /// srvctl session-drain window in minutes (`relocate -w`).
        #[arg(long, default_value_t = 30)]
        timeout_minutes: u32,
        /// Skip the post-relocation open-mode check.
        #[arg(long, default_value_t = false)]
        no_verify: bool,
        /// Open mode required by the verification query.
        #[arg(long, default_value = "READ WRITE")]
        expected_open_mode: String,
        /// Seconds between the first status checks while waiting.
        #[arg(long, default_value_t = 5)]
        poll_interval_secs: u64,
        /// Give up after this many status checks.
        #[arg(long, default_value_t = 60)]
        poll_max_attempts: u32,
    },
}

#[derive(Subcommand)]
pub enum OratabCommand {
    /// Print the registry entries.
    List {
        /// Registry file (default from ORATAB_PATH, then /etc/oratab).
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Diff the registry against running instances and add missing entries.
    Sync {
        #[arg(long)]
        path: Option<PathBuf>,
        /// Report the change set without writing the file.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// ORACLE_HOME recorded for added entries
        /// (default from ORAFLEET_DEFAULT_ORACLE_HOME).
        #[arg(long)]
        default_home: Option<String>,
    },
}

impl Cli {
    /// The command transport selected by the global ssh flags.
    pub fn runner(&self, settings: &Settings) -> Runner {
        match &self.ssh_host {
            None => Runner::Local(LocalRunner),
            Some(host) => {
                let mut runner = SshRunner::new(host.clone()).connect_timeout(
                    self.ssh_connect_timeout
                        .map(Duration::from_secs)
                        .unwrap_or(settings.ssh_connect_timeout),
                );
                if let Some(user) = self.ssh_user.as_ref().or(settings.ssh_user.as_ref()) {
                    runner = runner.user(user.clone());
                }
                Runner::Ssh(runner)
            }
        }
    }
}

/// Dispatch the parsed command. Returns the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<u8> {
    let settings = Settings::from_env();

    // The oratab file lives on this host; mixing a remote process table
    // with the local registry would corrupt it.
    if cli.ssh_host.is_some() && matches!(cli.command, Commands::Oratab { .. }) {
        return Err(UsageError(
            "oratab subcommands operate on the local registry and do not support --ssh-host"
                .to_string(),
        )
        .into());
    }

    let runner = cli.runner(&settings);

    match cli.command {
        Commands::Discover => commands::discover(&runner, cli.json).await,
        Commands::Run { command } => commands::run_command(&runner, &command).await,
        Commands::SqlJson {
            query,
            columns,
            connect,
            separator,
            oracle_sid,
            oracle_home,
        } => {
            let mut sql = orafleet_core::sqljson::SqlQuery::new(query, columns)
                .connect(connect.unwrap_or_else(|| settings.sqlplus_connect.clone()))
                .separator(separator);
            if let Some(sid) = oracle_sid {
                sql = sql.oracle_sid(sid);
            }
            if let Some(home) = oracle_home {
                sql = sql.oracle_home(home);
            }
            commands::sql_json(&runner, &sql, cli.json).await
        }
        Commands::JsonGet { path, file } => commands::json_get(&path, file.as_deref(), cli.json),
        Commands::Oratab { command } => match command {
            OratabCommand::List { path } => {
                commands::oratab_list(&path.unwrap_or_else(|| settings.oratab_path.clone()), cli.json)
            }
            OratabCommand::Sync {
                path,
                dry_run,
                default_home,
            } => {
                commands::oratab_sync(
                    &runner,
                    &path.unwrap_or_else(|| settings.oratab_path.clone()),
                    default_home.or_else(|| settings.default_oracle_home.clone()),
                    dry_run,
                    cli.json,
                )
                .await
            }
        },
        Commands::Status { database } => commands::status(&runner, &database, cli.json).await,
        Commands::Relocate {
            database,
            node,
            timeout_minutes,
            no_verify,
            expected_open_mode,
            poll_interval_secs,
            poll_max_attempts,
        } => {
            let mut request = orafleet_core::clusterware::RelocateRequest::new(database, node);
            request.timeout_minutes = timeout_minutes;
            request.verify = !no_verify;
            request.expected_open_mode = expected_open_mode;
            let poll = orafleet_core::clusterware::PollConfig {
                interval: Duration::from_secs(poll_interval_secs),
                max_attempts: poll_max_attempts,
                ..Default::default()
            };
            commands::relocate(&runner, &request, &poll, cli.json).await
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_relocate_flags() {
        let cli = Cli::parse_from([
            "orafleet",
            "relocate",
            "-d",
            "orcl",
            "-n",
            "dbnode2",
            "--timeout-minutes",
            "10",
            "--no-verify",
        ]);
        match cli.command {
            Commands::Relocate {
                database,
                node,
                timeout_minutes,
                no_verify,
                ..
            } => {
                assert_eq!(database, "orcl");
                assert_eq!(node, "dbnode2");
                assert_eq!(timeout_minutes, 10);
                assert!(no_verify);
            }
            _ => panic!("expected relocate"),
        }
    }

    #[test]
    fn parses_comma_separated_columns() {
        let cli = Cli::parse_from([
            "orafleet",
            "sql-json",
            "--query",
            "select sid||'|'||node from gv$instance",
            "--columns",
            "sid,node",
        ]);
        match cli.command {
            Commands::SqlJson { columns, separator, .. } => {
                assert_eq!(columns, vec!["sid", "node"]);
                assert_eq!(separator, '|');
            }
            _ => panic!("expected sql-json"),
        }
    }

    #[test]
    fn run_requires_a_command() {
        let result = Cli::try_parse_from(["orafleet", "run"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn oratab_rejects_ssh_host_as_usage_error() {
        let cli = Cli::parse_from([
            "orafleet",
            "--ssh-host",
            "dbnode2",
            "oratab",
            "list",
        ]);
        let err = run(cli).await.expect_err("must fail");
        assert!(err.to_string().contains("--ssh-host"));
        // Must be distinguishable from an operational failure so main
        // exits with the usage code.
        assert!(err.downcast_ref::<UsageError>().is_some());
    }
}
