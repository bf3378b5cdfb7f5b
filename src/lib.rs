//! modstat - module usage statistics for HPC job scripts
//!
//! This library infers which software modules a cluster's jobs actually use.
//! Each job is a pair of files: a scheduler metadata record (XML) and the
//! job script itself. Scripts are scanned for explicit module loads and for
//! tokens that look like executables, which are resolved against an index of
//! every executable installed in the module repository.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod job_record;
pub mod module_index;
pub mod node_spec;
pub mod ranking;
pub mod record;
pub mod script;
pub mod usage;
