//! Sandbox directory lifecycle: finding or creating the per-run scratch
//! directory under `/tmp`, materializing empty proxy files, and tearing the
//! directory down on cleanup.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd;

use crate::error::FssbError;

const MODE_0775: Mode = Mode::from_bits_truncate(0o775);

/// Creates `/tmp/fssb-<n>/` for the smallest positive `n` not already taken,
/// with mode 0775, and returns its path.
pub fn create_sandbox_dir() -> Result<PathBuf, FssbError> {
    let mut n: u32 = 1;
    loop {
        let candidate = PathBuf::from(format!("/tmp/fssb-{}", n));
        match unistd::mkdir(&candidate, MODE_0775) {
            Ok(()) => return Ok(candidate),
            Err(Errno::EEXIST) => {
                n += 1;
                continue;
            }
            Err(e) => return Err(FssbError::Ptrace(e)),
        }
    }
}

/// Creates a zero-length file at `path`, overwriting nothing if it already
/// exists but is non-empty — callers only ever call this for a path they
/// already know to be unoccupied.
pub fn materialize_empty(path: &Path) -> Result<(), FssbError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(())
}

/// Removes the sandbox directory itself. Called only after every proxy file
/// inside it has already been removed by the registry's cleanup pass.
pub fn remove_sandbox_dir(path: &Path) -> io::Result<()> {
    std::fs::remove_dir(path)
}
