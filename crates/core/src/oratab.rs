//! `/etc/oratab` registry model.
//!
//! oratab is the host-local registry of Oracle instances: one
//! `SID:ORACLE_HOME:FLAG` line per instance, where the flag tells the
//! startup scripts whether to auto-start it (`Y`), leave it alone (`N`),
//! or wait for it (`W`). The file is hand-edited in practice, so the model
//! is line-preserving: comments, blank lines, and even malformed lines
//! survive a parse/render round trip byte for byte. Only lines this code
//! explicitly changes are rewritten.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::discovery::RunningInstance;

/// Default registry path on Linux hosts.
pub const DEFAULT_ORATAB_PATH: &str = "/etc/oratab";

/// Autostart flag of an oratab entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Autostart {
    Yes,
    No,
    Wait,
}

impl Autostart {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Y" => Some(Self::Yes),
            "N" => Some(Self::No),
            "W" => Some(Self::Wait),
            _ => None,
        }
    }
}

impl fmt::Display for Autostart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Yes => 'Y',
            Self::No => 'N',
            Self::Wait => 'W',
        };
        write!(f, "{c}")
    }
}

/// One parsed `SID:ORACLE_HOME:FLAG` registry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub sid: String,
    pub home: String,
    pub autostart: Autostart,
}

impl Entry {
    fn render(&self) -> String {
        format!("{}:{}:{}", self.sid, self.home, self.autostart)
    }
}

/// One line of the file. Non-entry lines keep their original text.
#[derive(Debug, Clone)]
enum Line {
    /// A parsed entry; `raw` is the original text, cleared when the entry
    /// is modified so render regenerates it.
    Entry { entry: Entry, raw: Option<String> },
    /// Comment, blank, or unparseable line, kept verbatim.
    Verbatim(String),
}

#[derive(Debug, Error)]
pub enum OratabError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Outcome of [`OratabFile::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Change set computed by [`OratabFile::reconcile`].
///
/// Additions are meant to be applied; stale entries are reported only --
/// a single process-list snapshot is not evidence that an instance should
/// be deregistered.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilePlan {
    /// Running instances with no registry entry, to be added.
    pub missing: Vec<RunningInstance>,
    /// Registered SIDs not currently running.
    pub stale: Vec<String>,
    /// SIDs that appear on more than one entry line (first wins).
    pub duplicates: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty() && self.duplicates.is_empty()
    }
}

/// Line-preserving in-memory model of an oratab file.
#[derive(Debug, Clone, Default)]
pub struct OratabFile {
    lines: Vec<Line>,
}

impl OratabFile {
    /// Parse file text. Never fails: lines that do not parse as entries
    /// are carried verbatim.
    pub fn parse(text: &str) -> Self {
        let lines = text.lines().map(parse_line).collect();
        Self { lines }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OratabError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OratabError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// All parsed entries in file order, duplicates included.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { entry, .. } => Some(entry),
            Line::Verbatim(_) => None,
        })
    }

    /// First entry for `sid` (SIDs are case-sensitive).
    pub fn get(&self, sid: &str) -> Option<&Entry> {
        self.entries().find(|e| e.sid == sid)
    }

    /// SIDs that appear on more than one entry line.
    pub fn duplicate_sids(&self) -> Vec<String> {
        let mut seen: Vec<&str> = Vec::new();
        let mut dups: Vec<String> = Vec::new();
        for entry in self.entries() {
            if seen.contains(&entry.sid.as_str()) {
                if !dups.contains(&entry.sid) {
                    dups.push(entry.sid.clone());
                }
            } else {
                seen.push(&entry.sid);
            }
        }
        dups
    }

    /// Add an entry for `sid`, or update the first existing one in place.
    ///
    /// Untouched lines keep their original text; a modified or added line
    /// is rendered in canonical `SID:HOME:FLAG` form.
    pub fn upsert(&mut self, sid: &str, home: &str, autostart: Autostart) -> UpsertOutcome {
        for line in &mut self.lines {
            if let Line::Entry { entry, raw } = line {
                if entry.sid == sid {
                    if entry.home == home && entry.autostart == autostart {
                        return UpsertOutcome::Unchanged;
                    }
                    entry.home = home.to_string();
                    entry.autostart = autostart;
                    *raw = None;
                    return UpsertOutcome::Updated;
                }
            }
        }
        self.lines.push(Line::Entry {
            entry: Entry {
                sid: sid.to_string(),
                home: home.to_string(),
                autostart,
            },
            raw: None,
        });
        UpsertOutcome::Added
    }

    /// Render the file back to text, one trailing newline per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry {
                    raw: Some(raw), ..
                } => out.push_str(raw),
                Line::Entry { entry, raw: None } => out.push_str(&entry.render()),
                Line::Verbatim(text) => out.push_str(text),
            }
            out.push('\n');
        }
        out
    }

    /// Atomically replace the file at `path`: write a sibling temp file,
    /// then rename over the target. Readers never observe a partial file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OratabError> {
        let path = path.as_ref();
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        let write_err = |source| OratabError::Write {
            path: path.display().to_string(),
            source,
        };
        std::fs::write(&tmp, self.render()).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)?;
        tracing::info!(path = %path.display(), "oratab saved");
        Ok(())
    }

    /// Diff the registry against the instances actually running.
    ///
    /// Wildcard (`*`) entries are startup-script configuration, not
    /// instances, and are ignored in both directions.
    pub fn reconcile(&self, running: &[RunningInstance]) -> ReconcilePlan {
        let registered: Vec<&str> = self
            .entries()
            .map(|e| e.sid.as_str())
            .filter(|sid| *sid != "*")
            .collect();

        let missing = running
            .iter()
            .filter(|inst| !registered.contains(&inst.sid.as_str()))
            .cloned()
            .collect();

        let mut stale: Vec<String> = Vec::new();
        for sid in &registered {
            let runs = running.iter().any(|inst| inst.sid == *sid);
            if !runs && !stale.iter().any(|s| s == sid) {
                stale.push((*sid).to_string());
            }
        }

        ReconcilePlan {
            missing,
            stale,
            duplicates: self.duplicate_sids(),
        }
    }
}

fn parse_line(text: &str) -> Line {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Verbatim(text.to_string());
    }

    // SID:HOME:FLAG with optional extra colon-separated fields, which some
    // site tooling appends. Extra fields make the line verbatim-only so
    // they are never silently dropped on rewrite.
    let mut fields = trimmed.split(':');
    let (Some(sid), Some(home), Some(flag)) = (fields.next(), fields.next(), fields.next())
    else {
        return Line::Verbatim(text.to_string());
    };
    if sid.is_empty() || home.is_empty() || fields.next().is_some() {
        return Line::Verbatim(text.to_string());
    }
    let Some(autostart) = Autostart::parse(flag) else {
        return Line::Verbatim(text.to_string());
    };

    Line::Entry {
        entry: Entry {
            sid: sid.to_string(),
            home: home.to_string(),
            autostart,
        },
        raw: Some(text.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
