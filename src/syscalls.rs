//! Syscall numbers the interposer dispatches on, one constant set per
//! traced architecture.

#[cfg(target_arch = "x86_64")]
pub mod nr {
    pub const OPEN: i64 = 2;
    pub const STAT: i64 = 4;
    pub const LSTAT: i64 = 6;
    pub const ACCESS: i64 = 21;
    pub const RENAME: i64 = 82;
    pub const CREAT: i64 = 85;
    pub const UNLINK: i64 = 87;
    pub const EXECVE: i64 = 59;
    pub const EXIT: i64 = 60;
    pub const EXIT_GROUP: i64 = 231;
    pub const UNLINKAT: i64 = 263;
}

#[cfg(target_arch = "x86")]
pub mod nr {
    pub const EXIT: i64 = 1;
    pub const OPEN: i64 = 5;
    pub const CREAT: i64 = 8;
    pub const UNLINK: i64 = 10;
    pub const EXECVE: i64 = 11;
    pub const ACCESS: i64 = 33;
    pub const RENAME: i64 = 38;
    pub const STAT: i64 = 106;
    pub const LSTAT: i64 = 107;
    pub const EXIT_GROUP: i64 = 252;
    pub const UNLINKAT: i64 = 301;
}

bitflags::bitflags! {
    /// Subset of `open(2)`'s flag bits the interposer needs to classify a
    /// call as write-intent or not.
    pub struct OpenFlags: i32 {
        const O_WRONLY = libc::O_WRONLY;
        const O_RDWR   = libc::O_RDWR;
        const O_CREAT  = libc::O_CREAT;
        const O_APPEND = libc::O_APPEND;
    }
}

impl OpenFlags {
    /// True if any of `O_APPEND`, `O_CREAT`, `O_WRONLY`, `O_RDWR` is set.
    ///
    /// "Exactly `O_RDONLY`" is deliberately not a method here: `O_RDONLY`
    /// is 0, so that check means the *entire* raw flags word is zero, not
    /// just the four bits this bitset tracks. `from_bits_truncate` has
    /// already discarded every other bit (`O_CLOEXEC`, `O_DIRECTORY`, ...)
    /// by the time a value reaches `OpenFlags`, so the truncated bitset
    /// alone can't answer that question — callers compare the raw `i32`
    /// argument to `0` directly instead.
    pub fn is_write_intent(self) -> bool {
        self.intersects(OpenFlags::O_APPEND | OpenFlags::O_CREAT | OpenFlags::O_WRONLY | OpenFlags::O_RDWR)
    }
}

/// Which syscall a dispatched entry stop corresponds to, independent of
/// the numeric encoding for the traced architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Open,
    Creat,
    Stat,
    Lstat,
    Access,
    Unlink,
    Unlinkat,
    Rename,
    Exit,
    ExitGroup,
    Execve,
}

impl Syscall {
    pub fn from_number(n: i64) -> Option<Syscall> {
        match n {
            _ if n == nr::OPEN => Some(Syscall::Open),
            _ if n == nr::CREAT => Some(Syscall::Creat),
            _ if n == nr::STAT => Some(Syscall::Stat),
            _ if n == nr::LSTAT => Some(Syscall::Lstat),
            _ if n == nr::ACCESS => Some(Syscall::Access),
            _ if n == nr::UNLINK => Some(Syscall::Unlink),
            _ if n == nr::UNLINKAT => Some(Syscall::Unlinkat),
            _ if n == nr::RENAME => Some(Syscall::Rename),
            _ if n == nr::EXIT => Some(Syscall::Exit),
            _ if n == nr::EXIT_GROUP => Some(Syscall::ExitGroup),
            _ if n == nr::EXECVE => Some(Syscall::Execve),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_numbers_pass_through() {
        assert_eq!(Syscall::from_number(-1), None);
    }

    #[test]
    fn open_flag_classification() {
        assert!(OpenFlags::O_WRONLY.is_write_intent());
        assert!(OpenFlags::O_CREAT.is_write_intent());
        assert!(!OpenFlags::empty().is_write_intent());
    }

    #[test]
    fn o_rdonly_with_extra_non_write_bits_is_not_write_intent() {
        // O_RDONLY | O_CLOEXEC is not write-intent, but it also isn't the
        // raw flags word == 0 that "exactly O_RDONLY" requires. Whether to
        // redirect such an open is decided by the interposer comparing the
        // raw flags argument to 0 directly, not by anything in this
        // bitset — `is_write_intent` only needs to get the first half of
        // that decision right.
        let flags = OpenFlags::from_bits_truncate(libc::O_CLOEXEC);
        assert!(!flags.is_write_intent());
    }

    #[test]
    fn creat_mode_bits_are_not_mistaken_for_open_flags() {
        // creat(path, 0644)'s second argument is a permission mode, not an
        // open(2) flag word. Decoding 0644 as flags must not happen to look
        // like a read-only open (its low bits are unrelated to O_WRONLY).
        let mode_as_flags = OpenFlags::from_bits_truncate(0o644);
        assert!(!mode_as_flags.is_write_intent());
    }

    #[test]
    fn recognizes_every_dispatched_syscall_number() {
        assert_eq!(Syscall::from_number(nr::OPEN), Some(Syscall::Open));
        assert_eq!(Syscall::from_number(nr::UNLINKAT), Some(Syscall::Unlinkat));
        assert_eq!(Syscall::from_number(nr::EXECVE), Some(Syscall::Execve));
    }
}
