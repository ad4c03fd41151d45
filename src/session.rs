//! The single long-lived value threaded through one fssb run: the sandbox
//! directory, the proxy file registry, the scratch write slots, and the
//! two output sinks. Replaces what would otherwise be process-wide mutable
//! state shared between the CLI, the interposer, and cleanup.

use std::io::Write;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use crate::error::FssbError;
use crate::memory;
use crate::registry::ProxyFileRegistry;
use crate::sandbox;
use crate::scratch::WriteSlots;

pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

pub struct Session {
    sandbox_dir: PathBuf,
    registry: ProxyFileRegistry,
    slots: Option<WriteSlots>,
    log_sink: Box<dyn Write>,
    debug_sink: Option<Box<dyn Write>>,
    cleanup_on_exit: bool,
    print_map: bool,
}

impl Session {
    pub fn new(
        sandbox_dir: PathBuf,
        log_sink: Box<dyn Write>,
        debug_sink: Option<Box<dyn Write>>,
        cleanup_on_exit: bool,
        print_map: bool,
    ) -> Self {
        let mut dir_bytes = sandbox_dir.as_os_str().to_string_lossy().into_owned().into_bytes();
        if dir_bytes.last() != Some(&b'/') {
            dir_bytes.push(b'/');
        }
        Session {
            sandbox_dir,
            registry: ProxyFileRegistry::new(dir_bytes),
            slots: None,
            log_sink,
            debug_sink,
            cleanup_on_exit,
            print_map,
        }
    }

    pub fn sandbox_dir(&self) -> &Path {
        &self.sandbox_dir
    }

    pub fn sandbox_dir_bytes(&self) -> Vec<u8> {
        self.registry.sandbox_dir().to_vec()
    }

    pub fn registry_mut(&mut self) -> &mut ProxyFileRegistry {
        &mut self.registry
    }

    /// Discovers the tracee's scratch write slots, if not already done.
    /// Idempotent; safe to call before dispatching every non-`execve`
    /// syscall. Returns `true` the one time discovery actually ran, so
    /// callers can log it exactly once.
    pub fn ensure_scratch_slots(&mut self, pid: Pid) -> Result<bool, FssbError> {
        if self.slots.is_some() {
            return Ok(false);
        }
        let region = memory::first_executable_region(pid)?;
        self.slots = Some(WriteSlots::from_region(&region)?);
        Ok(true)
    }

    /// Writes `path` into scratch slot `index`. Fails if the slots haven't
    /// been discovered yet (a caller bug) or if `path` doesn't fit.
    pub fn write_scratch(&mut self, pid: Pid, index: usize, path: &[u8]) -> Result<(), FssbError> {
        let slots = self.slots.ok_or_else(|| {
            FssbError::Usage("scratch slots used before discovery".to_string())
        })?;
        crate::scratch::materialize_path(pid, &slots, index, path)?;
        Ok(())
    }

    /// Address of scratch slot `index`. Panics if called before
    /// [`Session::ensure_scratch_slots`]; every call site upstream already
    /// guarantees that ordering.
    pub fn scratch_addr(&self, index: usize) -> u64 {
        self.slots.expect("scratch slots not yet discovered").slot(index)
    }

    pub fn real_path_exists(&self, path: &[u8]) -> bool {
        bytes_to_path(path).exists()
    }

    pub fn log_child_exit(&mut self, code: i32) {
        let _ = writeln!(self.log_sink, "fssb: child exited with {}", code);
        let _ = writeln!(
            self.log_sink,
            "fssb: sandbox directory: {}",
            self.sandbox_dir.display()
        );
        log::info!("child exited with {}", code);
    }

    /// Emits one per-syscall debug line to the `-d` sink, if one was
    /// requested. A missing `-d` means these lines are dropped rather than
    /// routed anywhere, matching the "off by default" contract.
    pub fn debug_log(&mut self, line: std::fmt::Arguments<'_>) {
        if let Some(sink) = self.debug_sink.as_mut() {
            let _ = writeln!(sink, "{}", line);
        }
    }

    /// Writes the sandbox's file-map, optionally echoes it to the log sink,
    /// and — if cleanup was requested — deletes every proxy file and the
    /// sandbox directory itself. Called once, after the tracee has exited.
    pub fn finish(&mut self) -> Result<(), FssbError> {
        let map_path = self.sandbox_dir.join("file-map");
        let file = std::fs::File::create(&map_path)?;
        self.registry.write_map(file)?;

        if self.print_map {
            let mut buf = Vec::new();
            self.registry.write_map(&mut buf)?;
            let _ = self.log_sink.write_all(&buf);
        }

        if self.cleanup_on_exit {
            self.registry.remove_all_proxy_files();
            let _ = std::fs::remove_file(&map_path);
            let _ = sandbox::remove_sandbox_dir(&self.sandbox_dir);
        }
        Ok(())
    }
}
