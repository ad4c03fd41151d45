//! Architecture capability boundary for the register interface: which Linux
//! syscall ABI a tracee is running under, and what that ABI's register
//! layout looks like. Expressed as an enum plus one struct per layout so
//! call sites never need an `#[cfg]` of their own.

/// The two Linux/x86 ABIs fssb can trace. Detected once per tracee, right
/// after the initial `PTRACE_TRACEME` stop, and fixed for that tracee's
/// lifetime — a child that execs into a different bitness mid-run is not
/// followed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SupportedArch {
    X86,
    X64,
}

impl SupportedArch {
    /// Number of general-purpose syscall argument registers the ABI exposes.
    pub const MAX_SYSCALL_ARGS: usize = 6;
}

/// Raw `user_regs_struct` layout for 32-bit (`x86`) tracees, per
/// `<sys/user.h>`. Field order matches the kernel ABI exactly.
#[cfg(target_arch = "x86")]
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UserRegsStructX86 {
    pub ebx: i32,
    pub ecx: i32,
    pub edx: i32,
    pub esi: i32,
    pub edi: i32,
    pub ebp: i32,
    pub eax: i32,
    pub xds: i32,
    pub xes: i32,
    pub xfs: i32,
    pub xgs: i32,
    pub orig_eax: i32,
    pub eip: i32,
    pub xcs: i32,
    pub eflags: i32,
    pub esp: i32,
    pub xss: i32,
}
