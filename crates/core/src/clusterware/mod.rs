//! Oracle Clusterware drivers.
//!
//! Typed wrappers over the `srvctl` and `crsctl` vendor CLIs, plus the
//! RAC One Node relocation workflow built on top of them. The binaries
//! themselves do all the cluster work; this module only builds their
//! argv, parses their human-oriented output into types, and sequences
//! the relocate/poll/verify steps.

mod crsctl;
mod relocate;
mod srvctl;

pub use crsctl::{check_crs, CrsctlError, ServiceHealth, StackHealth};
pub use relocate::{
    relocate, PollConfig, RelocateError, RelocateOutcome, RelocateRequest,
};
pub use srvctl::{
    config_database, relocate_database, status_database, DatabaseConfig, DatabaseState,
    DatabaseStatus, DatabaseType, SrvctlError,
};
