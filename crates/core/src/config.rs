//! Environment-derived defaults.
//!
//! Every setting has a CLI flag that overrides it; the environment (and a
//! `.env` file loaded by the binary) supplies fleet-wide defaults.
//!
//! | Variable                            | Default        |
//! |-------------------------------------|----------------|
//! | `ORATAB_PATH`                       | `/etc/oratab`  |
//! | `ORAFLEET_SSH_USER`                 | (ssh default)  |
//! | `ORAFLEET_SSH_CONNECT_TIMEOUT_SECS` | `10`           |
//! | `ORAFLEET_SQLPLUS_CONNECT`          | `/ as sysdba`  |
//! | `ORAFLEET_DEFAULT_ORACLE_HOME`      | (none)         |

use std::path::PathBuf;
use std::time::Duration;

use crate::oratab::DEFAULT_ORATAB_PATH;
use crate::sqljson::DEFAULT_CONNECT;

const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub oratab_path: PathBuf,
    pub ssh_user: Option<String>,
    pub ssh_connect_timeout: Duration,
    pub sqlplus_connect: String,
    /// `ORACLE_HOME` recorded for oratab entries added by reconcile.
    pub default_oracle_home: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ssh_connect_timeout_secs = lookup("ORAFLEET_SSH_CONNECT_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SSH_CONNECT_TIMEOUT_SECS);

        Self {
            oratab_path: lookup("ORATAB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ORATAB_PATH)),
            ssh_user: lookup("ORAFLEET_SSH_USER").filter(|v| !v.is_empty()),
            ssh_connect_timeout: Duration::from_secs(ssh_connect_timeout_secs),
            sqlplus_connect: lookup("ORAFLEET_SQLPLUS_CONNECT")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CONNECT.to_string()),
            default_oracle_home: lookup("ORAFLEET_DEFAULT_ORACLE_HOME").filter(|v| !v.is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.oratab_path, PathBuf::from("/etc/oratab"));
        assert!(settings.ssh_user.is_none());
        assert_eq!(settings.ssh_connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.sqlplus_connect, "/ as sysdba");
        assert!(settings.default_oracle_home.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_lookup(|key| match key {
            "ORATAB_PATH" => Some("/var/opt/oracle/oratab".into()),
            "ORAFLEET_SSH_USER" => Some("oracle".into()),
            "ORAFLEET_SSH_CONNECT_TIMEOUT_SECS" => Some("3".into()),
            "ORAFLEET_SQLPLUS_CONNECT" => Some("sys/pw@orcl as sysdba".into()),
            "ORAFLEET_DEFAULT_ORACLE_HOME" => Some("/u01/app/oracle".into()),
            _ => None,
        });
        assert_eq!(settings.oratab_path, PathBuf::from("/var/opt/oracle/oratab"));
        assert_eq!(settings.ssh_user.as_deref(), Some("oracle"));
        assert_eq!(settings.ssh_connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.sqlplus_connect, "sys/pw@orcl as sysdba");
        assert_eq!(settings.default_oracle_home.as_deref(), Some("/u01/app/oracle"));
    }

    #[test]
    fn unparseable_timeout_falls_back() {
        let settings = Settings::from_lookup(|key| {
            (key == "ORAFLEET_SSH_CONNECT_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(settings.ssh_connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let settings = Settings::from_lookup(|key| {
            matches!(key, "ORAFLEET_SSH_USER" | "ORAFLEET_SQLPLUS_CONNECT")
                .then(String::new)
        });
        assert!(settings.ssh_user.is_none());
        assert_eq!(settings.sqlplus_connect, "/ as sysdba");
    }
}
