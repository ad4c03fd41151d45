//! Register access for a traced process: reading and rewriting syscall
//! arguments, and reading the syscall number and return value. A tracee
//! only ever shares the tracer's own word size, so the active register
//! layout is chosen once at compile time rather than carried at runtime.

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::arch::SupportedArch;
#[cfg(target_arch = "x86")]
use crate::arch::UserRegsStructX86;
use crate::error::FssbError;

#[cfg(target_arch = "x86_64")]
pub type RawRegs = libc::user_regs_struct;
#[cfg(target_arch = "x86")]
pub type RawRegs = UserRegsStructX86;

/// The syscall-argument registers in Linux ABI order.
#[cfg(target_arch = "x86_64")]
const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "r10", "r8", "r9"];
#[cfg(target_arch = "x86")]
const ARG_REGS: [&str; 6] = ["ebx", "ecx", "edx", "esi", "edi", "ebp"];

/// A snapshot of (or staged update to) the tracee's general-purpose
/// registers, plus the arch it was captured under.
#[derive(Copy, Clone)]
pub struct Registers {
    arch: SupportedArch,
    raw: RawRegs,
}

impl Registers {
    pub fn arch(&self) -> SupportedArch {
        self.arch
    }

    /// The syscall number the kernel preserved at entry (`orig_rax` /
    /// `orig_eax`).
    pub fn syscall_number(&self) -> i64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.raw.orig_rax as i64
        }
        #[cfg(target_arch = "x86")]
        {
            self.raw.orig_eax as i64
        }
    }

    /// The syscall return value after a syscall-exit stop (`rax` / `eax`).
    pub fn syscall_return(&self) -> i64 {
        #[cfg(target_arch = "x86_64")]
        {
            self.raw.rax as i64
        }
        #[cfg(target_arch = "x86")]
        {
            self.raw.eax as i64
        }
    }

    /// Reads syscall argument `n` (0-5) in Linux ABI order. Returns
    /// `out-of-range` for `n >= 6`.
    pub fn syscall_arg(&self, n: usize) -> Result<u64, FssbError> {
        if n >= SupportedArch::MAX_SYSCALL_ARGS {
            return Err(FssbError::Usage(format!(
                "out-of-range syscall argument index {}",
                n
            )));
        }
        #[cfg(target_arch = "x86_64")]
        let value = match n {
            0 => self.raw.rdi,
            1 => self.raw.rsi,
            2 => self.raw.rdx,
            3 => self.raw.r10,
            4 => self.raw.r8,
            5 => self.raw.r9,
            _ => unreachable!(),
        };
        #[cfg(target_arch = "x86")]
        let value = match n {
            0 => self.raw.ebx as u32 as u64,
            1 => self.raw.ecx as u32 as u64,
            2 => self.raw.edx as u32 as u64,
            3 => self.raw.esi as u32 as u64,
            4 => self.raw.edi as u32 as u64,
            5 => self.raw.ebp as u32 as u64,
            _ => unreachable!(),
        };
        Ok(value)
    }

    /// Writes syscall argument `n` (0-5) in Linux ABI order. Returns
    /// `out-of-range` for `n >= 6`.
    pub fn set_syscall_arg(&mut self, n: usize, value: u64) -> Result<(), FssbError> {
        if n >= SupportedArch::MAX_SYSCALL_ARGS {
            return Err(FssbError::Usage(format!(
                "out-of-range syscall argument index {}",
                n
            )));
        }
        #[cfg(target_arch = "x86_64")]
        match n {
            0 => self.raw.rdi = value,
            1 => self.raw.rsi = value,
            2 => self.raw.rdx = value,
            3 => self.raw.r10 = value,
            4 => self.raw.r8 = value,
            5 => self.raw.r9 = value,
            _ => unreachable!(),
        }
        #[cfg(target_arch = "x86")]
        match n {
            0 => self.raw.ebx = value as i32,
            1 => self.raw.ecx = value as i32,
            2 => self.raw.edx = value as i32,
            3 => self.raw.esi = value as i32,
            4 => self.raw.edi = value as i32,
            5 => self.raw.ebp = value as i32,
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Names of the six ABI syscall-argument registers, in order. Used only
    /// for debug logging.
    pub fn arg_register_names() -> &'static [&'static str; 6] {
        &ARG_REGS
    }
}

/// Reads the tracee's full general-purpose register file (`PTRACE_GETREGS`).
pub fn read_registers(pid: Pid) -> Result<Registers, FssbError> {
    #[cfg(target_arch = "x86_64")]
    let arch = SupportedArch::X64;
    #[cfg(target_arch = "x86")]
    let arch = SupportedArch::X86;

    #[cfg(target_arch = "x86_64")]
    let raw = ptrace::getregs(pid)?;
    #[cfg(target_arch = "x86")]
    let raw = get_regs_x86(pid)?;

    Ok(Registers { arch, raw })
}

/// Writes the tracee's full general-purpose register file (`PTRACE_SETREGS`).
pub fn write_registers(pid: Pid, regs: &Registers) -> Result<(), FssbError> {
    #[cfg(target_arch = "x86_64")]
    {
        ptrace::setregs(pid, regs.raw)?;
    }
    #[cfg(target_arch = "x86")]
    {
        set_regs_x86(pid, &regs.raw)?;
    }
    Ok(())
}

#[cfg(target_arch = "x86")]
fn get_regs_x86(pid: Pid) -> Result<UserRegsStructX86, FssbError> {
    // `nix::sys::ptrace::getregs` hard-codes the native `libc::user_regs_struct`.
    // On a genuine 32-bit build that *is* this layout, so we can transmute the
    // read through the same raw `PTRACE_GETREGS` call nix performs.
    let raw = ptrace::getregs(pid)?;
    Ok(unsafe { std::mem::transmute::<libc::user_regs_struct, UserRegsStructX86>(raw) })
}

#[cfg(target_arch = "x86")]
fn set_regs_x86(pid: Pid, regs: &UserRegsStructX86) -> Result<(), FssbError> {
    let raw = unsafe { std::mem::transmute::<UserRegsStructX86, libc::user_regs_struct>(*regs) };
    ptrace::setregs(pid, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs_with_args(args: [u64; 6]) -> Registers {
        #[cfg(target_arch = "x86_64")]
        let raw: RawRegs = unsafe { std::mem::zeroed() };
        #[cfg(target_arch = "x86")]
        let raw: RawRegs = Default::default();

        let mut r = Registers {
            #[cfg(target_arch = "x86_64")]
            arch: SupportedArch::X64,
            #[cfg(target_arch = "x86")]
            arch: SupportedArch::X86,
            raw,
        };
        for (i, v) in args.iter().enumerate() {
            r.set_syscall_arg(i, *v).unwrap();
        }
        r
    }

    #[test]
    fn round_trips_all_six_argument_slots() {
        let r = regs_with_args([1, 2, 3, 4, 5, 6]);
        for i in 0..6 {
            assert_eq!(r.syscall_arg(i).unwrap(), (i as u64) + 1);
        }
    }

    #[test]
    fn rejects_out_of_range_argument_index() {
        let r = regs_with_args([0; 6]);
        assert!(r.syscall_arg(6).is_err());
    }
}
