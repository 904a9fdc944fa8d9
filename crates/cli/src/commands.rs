//! Subcommand implementations.
//!
//! Each function performs one core operation, prints its result (text or
//! JSON), and returns the process exit code. Operational failures are
//! returned as errors and mapped to exit code 1 in `main`.

use std::path::Path;

use orafleet_core::clusterware::{
    self, DatabaseState, PollConfig, RelocateRequest,
};
use orafleet_core::discovery;
use orafleet_core::exec::{CommandRunner, CommandSpec, Runner};
use orafleet_core::jsonpath;
use orafleet_core::oratab::{Autostart, OratabFile};
use orafleet_core::sqljson::{self, SqlQuery};
use tokio_util::sync::CancellationToken;

pub async fn discover(runner: &Runner, json: bool) -> anyhow::Result<u8> {
    let instances = discovery::discover(runner).await?;
    if json {
        println!("{}", serde_json::to_string(&instances)?);
    } else if instances.is_empty() {
        println!("no running Oracle instances found");
    } else {
        for instance in &instances {
            println!("{}\t{:?}", instance.sid, instance.kind);
        }
    }
    Ok(0)
}

/// Run an arbitrary command and mirror its streams and exit code.
pub async fn run_command(runner: &Runner, argv: &[String]) -> anyhow::Result<u8> {
    let Some((program, args)) = argv.split_first() else {
        anyhow::bail!("no command given");
    };
    let output = runner
        .run(CommandSpec::new(program.clone()).args(args.iter().cloned()))
        .await?;

    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    Ok(u8::try_from(output.exit_code).unwrap_or(1))
}

pub async fn sql_json(runner: &Runner, query: &SqlQuery, json: bool) -> anyhow::Result<u8> {
    let rows = sqljson::run_query(runner, query).await?;
    if json {
        println!("{rows}");
    } else {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(0)
}

pub fn json_get(path: &str, file: Option<&Path>, json: bool) -> anyhow::Result<u8> {
    let text = match file {
        Some(file) => std::fs::read_to_string(file)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let document: serde_json::Value = serde_json::from_str(&text)?;
    let value = jsonpath::extract(&document, path)?;
    if json {
        println!("{value}");
    } else {
        println!("{}", jsonpath::render_scalar(value));
    }
    Ok(0)
}

pub fn oratab_list(path: &Path, json: bool) -> anyhow::Result<u8> {
    let tab = OratabFile::load(path)?;
    if json {
        let entries: Vec<_> = tab.entries().collect();
        println!("{}", serde_json::to_string(&entries)?);
    } else {
        for entry in tab.entries() {
            println!("{}\t{}\t{}", entry.sid, entry.home, entry.autostart);
        }
    }
    Ok(0)
}

pub async fn oratab_sync(
    runner: &Runner,
    path: &Path,
    default_home: Option<String>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<u8> {
    let running = discovery::discover(runner).await?;
    let mut tab = if path.exists() {
        OratabFile::load(path)?
    } else {
        OratabFile::default()
    };

    let plan = tab.reconcile(&running);
    let applied = !dry_run && !plan.missing.is_empty();

    if applied {
        let home = default_home.ok_or_else(|| {
            anyhow::anyhow!(
                "instances to register but no ORACLE_HOME known; pass --default-home or set ORAFLEET_DEFAULT_ORACLE_HOME"
            )
        })?;
        for instance in &plan.missing {
            tab.upsert(&instance.sid, &home, Autostart::No);
            tracing::info!(sid = %instance.sid, home = %home, "Registering instance in oratab");
        }
        tab.save(path)?;
    }

    if json {
        let mut report = serde_json::to_value(&plan)?;
        report["applied"] = serde_json::Value::Bool(applied);
        println!("{report}");
    } else {
        for instance in &plan.missing {
            let verb = if applied { "added" } else { "missing" };
            println!("{verb}\t{}", instance.sid);
        }
        for sid in &plan.stale {
            println!("stale\t{sid}");
        }
        for sid in &plan.duplicates {
            println!("duplicate\t{sid}");
        }
        if plan.is_clean() {
            println!("oratab is in sync");
        }
    }
    Ok(0)
}

pub async fn status(runner: &Runner, database: &str, json: bool) -> anyhow::Result<u8> {
    let status = clusterware::status_database(runner, database).await?;
    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(0);
    }
    match &status.state {
        DatabaseState::Running { instance, node } => {
            let suffix = if status.relocation_active {
                " (online relocation active)"
            } else {
                ""
            };
            println!("{database}: instance {instance} running on node {node}{suffix}");
        }
        DatabaseState::NotRunning => println!("{database}: not running"),
    }
    Ok(0)
}

pub async fn relocate(
    runner: &Runner,
    request: &RelocateRequest,
    poll: &PollConfig,
    json: bool,
) -> anyhow::Result<u8> {
    // Ctrl-C stops the polling loop cleanly; the srvctl relocation itself
    // keeps running server-side and can be re-checked with `status`.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping relocation polling");
            signal_cancel.cancel();
        }
    });

    let outcome = clusterware::relocate(runner, request, poll, &cancel).await?;
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else if outcome.relocated {
        println!(
            "{} relocated to {} (instance {}, {} status checks)",
            request.database, outcome.node, outcome.instance, outcome.attempts
        );
    } else {
        println!(
            "{} already running on {} (instance {})",
            request.database, outcome.node, outcome.instance
        );
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use orafleet_core::exec::LocalRunner;

    #[tokio::test]
    async fn run_command_mirrors_exit_code() {
        let runner = Runner::Local(LocalRunner);
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 42".to_string()];
        let code = run_command(&runner, &argv).await.expect("run");
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn oratab_sync_dry_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oratab");
        std::fs::write(&path, "STALEDB:/u01/home:N\n").expect("seed");

        // Local discovery on a test box finds no Oracle instances, so the
        // stale entry is reported and nothing is written.
        let runner = Runner::Local(LocalRunner);
        let code = oratab_sync(&runner, &path, None, true, false)
            .await
            .expect("sync");
        assert_eq!(code, 0);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "STALEDB:/u01/home:N\n"
        );
    }

    #[tokio::test]
    async fn oratab_sync_handles_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oratab");

        let runner = Runner::Local(LocalRunner);
        let code = oratab_sync(&runner, &path, None, true, false)
            .await
            .expect("sync");
        assert_eq!(code, 0);
        assert!(!path.exists());
    }

    #[test]
    fn json_get_reads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("doc.json");
        std::fs::write(&file, r#"{"db":{"sid":"ORCL1"}}"#).expect("write");

        let code = json_get("db.sid", Some(&file), false).expect("extract");
        assert_eq!(code, 0);
    }

    #[test]
    fn json_get_bad_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("doc.json");
        std::fs::write(&file, r#"{"db":{}}"#).expect("write");

        assert!(json_get("db.sid", Some(&file), false).is_err());
    }
}
