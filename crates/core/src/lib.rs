//! `orafleet-core` -- Oracle fleet operations library.
//!
//! Domain logic shared by the `orafleet` CLI: subprocess execution (local
//! and over ssh), running-instance discovery from the process list, the
//! `/etc/oratab` registry model, sqlplus result-to-JSON conversion,
//! dotted-path JSON extraction, and the srvctl/crsctl clusterware drivers
//! including the RAC One Node relocation workflow.
//!
//! Vendor tools (`sqlplus`, `srvctl`, `crsctl`, `ssh`, `ps`) are always
//! invoked as subprocesses through the [`exec::CommandRunner`] seam; this
//! crate never links against Oracle libraries.

pub mod clusterware;
pub mod config;
pub mod discovery;
pub mod exec;
pub mod jsonpath;
pub mod oratab;
pub mod sqljson;
