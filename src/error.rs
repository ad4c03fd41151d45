//! Error taxonomy for fssb's fatal failure paths.
//!
//! Failures that should abort the whole run get a typed variant here so
//! `main` can match on them (exit code selection, tests). Failures that
//! should only degrade a single syscall rewrite are deliberately *not*
//! represented as an `Err` anywhere in `interposer.rs`; they are logged and
//! the syscall is left unrewritten instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FssbError {
    #[error("{0}")]
    Usage(String),

    #[error("cannot fork")]
    Fork(#[source] std::io::Error),

    #[error("no executable (r-xp) region found in tracee {pid}")]
    NoExecutableRegion { pid: i32 },

    #[error("cannot open {path}: {source}")]
    LogFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ptrace operation failed: {0}")]
    Ptrace(#[from] nix::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
