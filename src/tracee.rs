//! Spawning the traced child and stepping it across syscall-stop boundaries.

use std::ffi::CString;

use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::FssbError;

/// Result of stepping a tracee forward to its next syscall-stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceeEvent {
    /// A syscall-entry or syscall-exit stop, tagged unambiguously by the
    /// sysgood bit.
    SyscallStop,
    /// The tracee ran to completion with this exit status.
    Exited(i32),
}

/// Forks, arranges for the child to request tracing and stop itself, then
/// execs `program` with `args` (argv[0] included) in the child. Returns the
/// child's pid to the parent. The child never returns from this function:
/// on exec failure it prints a diagnostic and calls `_exit(1)`.
pub fn spawn_traced(program: &str, args: &[String]) -> Result<Pid, FssbError> {
    match unsafe { unistd::fork() }.map_err(|e| FssbError::Fork(std::io::Error::from(e)))? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            ptrace::traceme().expect("PTRACE_TRACEME failed in child");
            nix::sys::signal::raise(Signal::SIGSTOP).expect("raise(SIGSTOP) failed in child");

            let c_program = CString::new(program).expect("program name contains a NUL byte");
            let c_args: Vec<CString> = args
                .iter()
                .map(|a| CString::new(a.as_str()).expect("argument contains a NUL byte"))
                .collect();

            let err = unistd::execvp(&c_program, &c_args).unwrap_err();
            eprintln!("fssb: {}: command not found", program);
            let _ = err;
            std::process::exit(1);
        }
    }
}

/// Waits for the tracee's initial self-inflicted stop and configures the
/// trace session so every subsequent syscall-stop is tagged by the sysgood
/// bit, distinguishing it from other signal-delivery stops.
pub fn attach_after_exec(pid: Pid) -> Result<(), FssbError> {
    match waitpid(pid, None).map_err(FssbError::Ptrace)? {
        WaitStatus::Stopped(_, Signal::SIGSTOP) => {}
        other => {
            return Err(FssbError::Usage(format!(
                "unexpected initial wait status from tracee: {:?}",
                other
            )))
        }
    }
    ptrace::setoptions(pid, ptrace::Options::PTRACE_O_TRACESYSGOOD).map_err(FssbError::Ptrace)
}

/// Resumes the tracee and blocks until its next syscall-stop or exit.
/// Non-syscall signal-delivery stops are stepped past (resumed with no
/// signal injected) rather than surfaced to the caller.
pub fn step_to_next_syscall_stop(pid: Pid) -> Result<TraceeEvent, FssbError> {
    loop {
        ptrace::syscall(pid, None).map_err(FssbError::Ptrace)?;
        match waitpid(pid, None).map_err(FssbError::Ptrace)? {
            WaitStatus::PtraceSyscall(_) => return Ok(TraceeEvent::SyscallStop),
            WaitStatus::Exited(_, code) => return Ok(TraceeEvent::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => return Ok(TraceeEvent::Exited(128 + signal as i32)),
            _ => continue,
        }
    }
}
