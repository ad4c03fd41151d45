//! Output sinks: the tracer's own `-o`/`-d` log files (part of the
//! program's documented interface) and the `log`/`env_logger` pipeline used
//! for internal diagnostics (not part of that interface, purely for
//! development and troubleshooting of fssb itself).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::FssbError;

/// Opens the file at `path` for writing, truncating any existing contents.
fn open_for_write(path: &Path) -> Result<File, FssbError> {
    File::create(path).map_err(|source| FssbError::LogFileOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the `-o` log sink: the given path if one was supplied, stdout
/// otherwise (matching the original tracer's `*log_file = stdout`).
pub fn open_log_sink(path: Option<&Path>) -> Result<Box<dyn Write>, FssbError> {
    match path {
        Some(p) => Ok(Box::new(open_for_write(p)?)),
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Resolves the `-d` debug sink: `Some` only if a path was supplied. A
/// missing `-d` means per-syscall debug lines are dropped rather than
/// routed anywhere, matching the "off by default" contract.
pub fn open_debug_sink(path: Option<&Path>) -> Result<Option<Box<dyn Write>>, FssbError> {
    match path {
        Some(p) => Ok(Some(Box::new(open_for_write(p)?))),
        None => Ok(None),
    }
}

/// Initializes the `log` crate's global logger from `RUST_LOG`, defaulting
/// to `warn` when unset. This is separate from the `-o`/`-d` sinks above:
/// it exists for fssb's own development diagnostics, not for the sandboxed
/// program's observable behavior.
pub fn init_diagnostics_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}
