//! The syscall interposer: the state machine that drives one tracee across
//! syscall-stop boundaries, rewriting path arguments in place and
//! restoring them before the tracee resumes.

use nix::unistd::Pid;

use crate::error::FssbError;
use crate::memory;
use crate::registers::{self, Registers};
use crate::scratch::slot;
use crate::session::Session;
use crate::syscalls::{OpenFlags, Syscall};
use crate::tracee::{self, TraceeEvent};

/// Runs the tracee to completion, dispatching every syscall-stop through
/// the handler table. Returns the tracee's exit status.
pub fn run(session: &mut Session, pid: Pid) -> Result<i32, FssbError> {
    loop {
        match tracee::step_to_next_syscall_stop(pid)? {
            TraceeEvent::Exited(code) => return Ok(code),
            TraceeEvent::SyscallStop => {}
        }

        let regs = registers::read_registers(pid)?;
        let syscall = Syscall::from_number(regs.syscall_number());

        if !matches!(syscall, Some(Syscall::Execve)) {
            if session.ensure_scratch_slots(pid)? {
                session.debug_log(format_args!(
                    "scratch slots ready ({:?}); syscall argument registers: {}",
                    regs.arch(),
                    Registers::arg_register_names().join(", ")
                ));
            }
        }

        let outcome = match syscall {
            Some(Syscall::Open) => handle_open(session, pid, regs, false),
            Some(Syscall::Creat) => handle_open(session, pid, regs, true),
            Some(Syscall::Stat) | Some(Syscall::Lstat) | Some(Syscall::Access) => {
                handle_stat_like(session, pid, regs)
            }
            Some(Syscall::Unlink) => handle_unlink(session, pid, regs, 0),
            Some(Syscall::Unlinkat) => handle_unlink(session, pid, regs, 1),
            Some(Syscall::Rename) => handle_rename(session, pid, regs),
            Some(Syscall::Exit) | Some(Syscall::ExitGroup) => {
                handle_exit(session, &regs);
                Ok(None)
            }
            Some(Syscall::Execve) | None => pass_through(pid),
        }?;

        if let Some(code) = outcome {
            return Ok(code);
        }
    }
}

/// Steps a pending syscall to its exit stop without touching registers.
/// Used for syscalls the interposer doesn't rewrite.
fn pass_through(pid: Pid) -> Result<Option<i32>, FssbError> {
    match tracee::step_to_next_syscall_stop(pid)? {
        TraceeEvent::Exited(code) => Ok(Some(code)),
        TraceeEvent::SyscallStop => Ok(None),
    }
}

/// Writes `regs` back to the tracee, steps to the matching syscall-exit
/// stop, then restores every `(index, original_value)` pair in `restore`
/// before returning. Returns `Some(code)` only in the unusual case that the
/// tracee exited instead of reaching the expected exit stop.
fn finish_and_restore(
    session: &mut Session,
    pid: Pid,
    regs: &mut Registers,
    restore: &[(usize, u64)],
) -> Result<Option<i32>, FssbError> {
    registers::write_registers(pid, regs)?;

    match tracee::step_to_next_syscall_stop(pid)? {
        TraceeEvent::Exited(code) => return Ok(Some(code)),
        TraceeEvent::SyscallStop => {}
    }

    let mut exit_regs = registers::read_registers(pid)?;
    session.debug_log(format_args!("-> {}", exit_regs.syscall_return()));
    for &(index, value) in restore {
        exit_regs.set_syscall_arg(index, value)?;
    }
    registers::write_registers(pid, &exit_regs)?;
    Ok(None)
}

/// Handles `open`/`creat` entry. `is_creat` is true for `creat(path, mode)`,
/// whose second argument is a permission mode, not an `open(2)` flag word —
/// `creat` is always write-intent regardless of those bits, equivalent to
/// `open(path, O_CREAT | O_WRONLY | O_TRUNC, mode)`.
fn handle_open(
    session: &mut Session,
    pid: Pid,
    mut regs: Registers,
    is_creat: bool,
) -> Result<Option<i32>, FssbError> {
    let orig_arg0 = regs.syscall_arg(0)?;
    let path = memory::read_cstring(pid, orig_arg0)?;
    // `creat(path, mode)`'s second argument is a permission mode, not an
    // open(2) flag word; stand in the flags `creat` is defined to imply
    // instead of reading arg 1 as if it were a flags bitset.
    let raw_flags: i32 = if is_creat {
        libc::O_CREAT | libc::O_WRONLY
    } else {
        regs.syscall_arg(1)? as i32
    };
    let flags = OpenFlags::from_bits_truncate(raw_flags);

    if flags.is_write_intent() {
        session.debug_log(format_args!("open as write {}", String::from_utf8_lossy(&path)));
        let proxy_path = session.registry_mut().lookup(&path).map(|r| r.proxy_path.clone());
        let proxy_path = match proxy_path {
            Some(p) => p,
            None => session.registry_mut().insert(path.clone()).proxy_path.clone(),
        };
        if let Err(e) = session.write_scratch(pid, slot::PATH, &proxy_path) {
            log::warn!("declining to rewrite open: {}", e);
        } else {
            regs.set_syscall_arg(0, session.scratch_addr(slot::PATH))?;
        }
    } else if raw_flags == 0 {
        // `O_RDONLY` is 0: spec.md §4.4 step 3 requires the *entire* raw
        // flags word to be exactly `O_RDONLY`, not merely "none of the
        // write-intent bits we track are set" — `O_RDONLY | O_CLOEXEC`
        // must pass through untouched, not get redirected.
        session.debug_log(format_args!("open as read {}", String::from_utf8_lossy(&path)));
        if let Some(proxy_path) = session.registry_mut().lookup(&path).map(|r| r.proxy_path.clone()) {
            if let Err(e) = session.write_scratch(pid, slot::PATH, &proxy_path) {
                log::warn!("declining to rewrite open: {}", e);
            } else {
                regs.set_syscall_arg(0, session.scratch_addr(slot::PATH))?;
            }
        }
    }

    finish_and_restore(session, pid, &mut regs, &[(0, orig_arg0)])
}

fn handle_stat_like(session: &mut Session, pid: Pid, mut regs: Registers) -> Result<Option<i32>, FssbError> {
    let orig_arg0 = regs.syscall_arg(0)?;
    let path = memory::read_cstring(pid, orig_arg0)?;

    if let Some(proxy_path) = session.registry_mut().lookup(&path).map(|r| r.proxy_path.clone()) {
        if let Err(e) = session.write_scratch(pid, slot::PATH, &proxy_path) {
            log::warn!("declining to rewrite stat-like call: {}", e);
        } else {
            regs.set_syscall_arg(0, session.scratch_addr(slot::PATH))?;
        }
    }

    finish_and_restore(session, pid, &mut regs, &[(0, orig_arg0)])
}

fn handle_unlink(
    session: &mut Session,
    pid: Pid,
    mut regs: Registers,
    arg_index: usize,
) -> Result<Option<i32>, FssbError> {
    let orig_arg = regs.syscall_arg(arg_index)?;
    let path = memory::read_cstring(pid, orig_arg)?;
    session.debug_log(format_args!("unlink {}", String::from_utf8_lossy(&path)));

    let existing = session
        .registry_mut()
        .lookup(&path)
        .map(|r| (r.fingerprint.clone(), r.proxy_path.clone()));
    let hit_fingerprint = existing.as_ref().map(|(fp, _)| fp.clone());
    let proxy_path = if let Some((_, proxy)) = existing {
        proxy
    } else {
        let fp = crate::fingerprint::fingerprint(&path);
        let mut candidate = session.sandbox_dir_bytes();
        candidate.extend_from_slice(fp.as_bytes());
        if session.real_path_exists(&path) {
            let candidate_path = crate::session::bytes_to_path(&candidate);
            if let Err(e) = crate::sandbox::materialize_empty(&candidate_path) {
                log::warn!("could not materialize empty proxy for unlink: {}", e);
                candidate.clear();
                candidate.extend_from_slice(&path);
            }
        } else {
            candidate.clear();
            candidate.extend_from_slice(&path);
        }
        candidate
    };

    let slot_index = if arg_index == 0 { slot::PATH } else { slot::OLDPATH };
    if proxy_path != path {
        if let Err(e) = session.write_scratch(pid, slot_index, &proxy_path) {
            log::warn!("declining to rewrite unlink: {}", e);
        } else {
            regs.set_syscall_arg(arg_index, session.scratch_addr(slot_index))?;
        }
    }

    let result = finish_and_restore(session, pid, &mut regs, &[(arg_index, orig_arg)])?;

    if let Some(fp) = hit_fingerprint {
        session.registry_mut().remove(&fp);
    }

    Ok(result)
}

fn handle_rename(session: &mut Session, pid: Pid, mut regs: Registers) -> Result<Option<i32>, FssbError> {
    let orig_old = regs.syscall_arg(0)?;
    let orig_new = regs.syscall_arg(1)?;
    let old_path = memory::read_cstring(pid, orig_old)?;
    let new_path = memory::read_cstring(pid, orig_new)?;
    session.debug_log(format_args!(
        "rename {} -> {}",
        String::from_utf8_lossy(&old_path),
        String::from_utf8_lossy(&new_path)
    ));

    let mut proxy_old = session.sandbox_dir_bytes();
    proxy_old.extend_from_slice(crate::fingerprint::fingerprint(&old_path).as_bytes());
    let mut proxy_new = session.sandbox_dir_bytes();
    proxy_new.extend_from_slice(crate::fingerprint::fingerprint(&new_path).as_bytes());

    if let Err(e) = session.write_scratch(pid, slot::OLDPATH, &proxy_old) {
        log::warn!("declining to rewrite rename source: {}", e);
    } else {
        regs.set_syscall_arg(0, session.scratch_addr(slot::OLDPATH))?;
    }
    if let Err(e) = session.write_scratch(pid, slot::NEWPATH, &proxy_new) {
        log::warn!("declining to rewrite rename destination: {}", e);
    } else {
        regs.set_syscall_arg(1, session.scratch_addr(slot::NEWPATH))?;
    }

    let result = finish_and_restore(session, pid, &mut regs, &[(0, orig_old), (1, orig_new)])?;

    if session.registry_mut().lookup(&old_path).is_some() {
        let old_fp = crate::fingerprint::fingerprint(&old_path);
        session.registry_mut().remove(&old_fp);
        // A prior record at the destination fingerprint, if any, must be
        // dropped before inserting — the registry allows at most one record
        // per fingerprint (R1), and `insert` doesn't itself check for a
        // collision.
        let new_fp = crate::fingerprint::fingerprint(&new_path);
        session.registry_mut().remove(&new_fp);
        session.registry_mut().insert(new_path);
    }

    Ok(result)
}

fn handle_exit(session: &mut Session, regs: &Registers) {
    let exit_code = regs.syscall_arg(0).unwrap_or(0);
    session.log_child_exit(exit_code as i32);
}
