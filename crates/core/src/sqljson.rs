//! SQL-to-JSON conversion through sqlplus.
//!
//! Runs a query in silent sqlplus (`-S -L`) with all decoration disabled
//! and converts the emitted rows into a JSON array of objects. sqlplus
//! carries no machine-readable output mode, so the contract is positional:
//! the query projects separator-delimited fields (for multi-column results,
//! `col_a || '|' || col_b` style) and the caller supplies the column names
//! used as JSON keys.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec, ExecError};

/// Default connect string: local OS authentication.
pub const DEFAULT_CONNECT: &str = "/ as sysdba";

/// Default field separator expected in result rows.
pub const DEFAULT_SEPARATOR: char = '|';

/// One sqlplus query and how to interpret its rows.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    /// The SQL statement. A terminating `;` is appended if absent.
    pub sql: String,
    /// JSON keys for the positional fields of each row.
    pub columns: Vec<String>,
    /// sqlplus connect string (`/ as sysdba`, `user/pass@tns`, ...).
    pub connect: String,
    /// Field separator the query projects between columns.
    pub separator: char,
    /// `ORACLE_SID` for the child process, when targeting a local instance.
    pub oracle_sid: Option<String>,
    /// `ORACLE_HOME` for the child process.
    pub oracle_home: Option<String>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            columns,
            connect: DEFAULT_CONNECT.to_string(),
            separator: DEFAULT_SEPARATOR,
            oracle_sid: None,
            oracle_home: None,
        }
    }

    pub fn connect(mut self, connect: impl Into<String>) -> Self {
        self.connect = connect.into();
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn oracle_sid(mut self, sid: impl Into<String>) -> Self {
        self.oracle_sid = Some(sid.into());
        self
    }

    pub fn oracle_home(mut self, home: impl Into<String>) -> Self {
        self.oracle_home = Some(home.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum SqlJsonError {
    #[error("query must name at least one column")]
    NoColumns,
    #[error("sqlplus invocation failed: {0}")]
    Exec(#[from] ExecError),
    /// An `ORA-` or `SP2-` diagnostic appeared in the output.
    #[error("oracle error: {message}")]
    Oracle { message: String },
}

/// The sqlplus script piped to stdin: silent settings, the query, exit.
fn build_script(query: &SqlQuery) -> String {
    let mut sql = query.sql.trim().to_string();
    if !sql.ends_with(';') && !sql.ends_with('/') {
        sql.push(';');
    }
    format!(
        "set pagesize 0 feedback off heading off echo off verify off trimspool on\n\
         whenever sqlerror exit 1\n\
         {sql}\n\
         exit\n"
    )
}

/// Run `query` through `runner` and return its rows as a JSON array of
/// objects keyed by `query.columns`.
pub async fn run_query<R: CommandRunner>(
    runner: &R,
    query: &SqlQuery,
) -> Result<Value, SqlJsonError> {
    if query.columns.is_empty() {
        return Err(SqlJsonError::NoColumns);
    }

    let mut spec = CommandSpec::new("sqlplus")
        .args(["-S", "-L", query.connect.as_str()])
        .stdin(build_script(query));
    if let Some(sid) = &query.oracle_sid {
        spec = spec.env("ORACLE_SID", sid);
    }
    if let Some(home) = &query.oracle_home {
        spec = spec.env("ORACLE_HOME", home);
    }

    let output = runner.run(spec).await?;

    // sqlplus reports errors on stdout; scan before looking at the exit
    // code so the ORA- text wins over a bare "exit 1".
    check_for_oracle_errors(&output.stdout)?;
    let output = output.require_success()?;

    tracing::debug!(
        columns = query.columns.len(),
        duration_ms = output.duration_ms,
        "sqlplus query complete",
    );
    Ok(rows_to_json(
        &output.stdout,
        &query.columns,
        query.separator,
    ))
}

fn check_for_oracle_errors(stdout: &str) -> Result<(), SqlJsonError> {
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("ORA-") || trimmed.starts_with("SP2-") {
            return Err(SqlJsonError::Oracle {
                message: trimmed.to_string(),
            });
        }
    }
    Ok(())
}

/// Convert separator-delimited result rows to a JSON array of objects.
///
/// Blank lines are skipped. Per field: empty or `NULL` becomes JSON null,
/// integers and floats become JSON numbers, everything else a string. A
/// row with more fields than columns keeps the extras joined into the
/// last column; a short row pads with null.
pub fn rows_to_json(stdout: &str, columns: &[String], separator: char) -> Value {
    let mut rows = Vec::new();

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: Vec<&str> = line.split(separator).collect();
        if fields.len() > columns.len() {
            // Rejoin the overflow so separator characters inside the last
            // projected column are not lost.
            let tail = fields.split_off(columns.len() - 1);
            let joined = tail.join(&separator.to_string());
            let mut object = Map::new();
            for (name, field) in columns[..columns.len() - 1].iter().zip(&fields) {
                object.insert(name.clone(), coerce_field(field));
            }
            object.insert(
                columns[columns.len() - 1].clone(),
                coerce_field(&joined),
            );
            rows.push(Value::Object(object));
            continue;
        }

        let mut object = Map::new();
        for (i, name) in columns.iter().enumerate() {
            let value = fields.get(i).map_or(Value::Null, |f| coerce_field(f));
            object.insert(name.clone(), value);
        }
        rows.push(Value::Object(object));
    }

    Value::Array(rows)
}

fn coerce_field(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "NULL" {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
