//! Scratch memory allocation: carving fixed-size write slots out of the
//! tracee's own executable mapping so rewritten syscall arguments have
//! somewhere to live in the tracee's address space.

use crate::error::FssbError;
use crate::memory::{self, MappedRegion};

/// Size in bytes of one write slot, including its terminating NUL.
pub const SLOT_SIZE: usize = 256;

/// Longest byte string (excluding the terminating NUL) that fits in a slot.
pub const MAX_PATH_LEN: usize = SLOT_SIZE - 1;

/// Number of write slots carved out of the executable region.
pub const SLOT_COUNT: usize = 6;

/// The fixed set of scratch write slots for one tracee, located at a stable
/// offset inside the tracee's first executable mapping. Each slot is a
/// 256-byte region the interposer can safely overwrite: the instruction
/// bytes originally there are never executed because the slots live past
/// the portion of the mapping the tracee's own code occupies at the moment
/// the region is discovered (right after the initial stop, before the
/// tracee has run any of its own code).
#[derive(Debug, Clone, Copy)]
pub struct WriteSlots {
    base: u64,
}

impl WriteSlots {
    /// Builds a `WriteSlots` whose six slots sit back-to-back starting at
    /// `region.start`.
    pub fn from_region(region: &MappedRegion) -> Result<Self, FssbError> {
        let needed = (SLOT_COUNT * SLOT_SIZE) as u64;
        if region.end.saturating_sub(region.start) < needed {
            return Err(FssbError::Usage(format!(
                "executable region too small for scratch slots: {} bytes available, {} needed",
                region.end - region.start,
                needed
            )));
        }
        Ok(WriteSlots {
            base: region.start,
        })
    }

    /// Address of slot `index` (0-5). Panics on out-of-range index; callers
    /// only ever index with a small fixed set of named slot roles.
    pub fn slot(&self, index: usize) -> u64 {
        assert!(index < SLOT_COUNT, "scratch slot index out of range");
        self.base + (index * SLOT_SIZE) as u64
    }
}

/// Well-known slot roles used by the interposer. Keeping these as constants
/// rather than a free-floating index keeps call sites self-describing.
pub mod slot {
    pub const PATH: usize = 0;
    pub const OLDPATH: usize = 1;
    pub const NEWPATH: usize = 2;
    pub const STAT_BUF: usize = 3;
    pub const SPARE_A: usize = 4;
    pub const SPARE_B: usize = 5;
}

/// Writes `path` into scratch slot `index`, returning the address it was
/// written at. Fails if `path` (plus its NUL) doesn't fit in one slot.
pub fn materialize_path(
    pid: nix::unistd::Pid,
    slots: &WriteSlots,
    index: usize,
    path: &[u8],
) -> Result<u64, FssbError> {
    if path.len() > MAX_PATH_LEN {
        return Err(FssbError::Usage(format!(
            "path too long for scratch slot: {} bytes, max {}",
            path.len(),
            MAX_PATH_LEN
        )));
    }
    let addr = slots.slot(index);
    memory::write_cstring(pid, addr, path)?;
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(len: u64) -> MappedRegion {
        MappedRegion {
            start: 0x1000,
            end: 0x1000 + len,
            readable: true,
            writable: false,
            executable: true,
            private: true,
        }
    }

    #[test]
    fn slots_are_packed_back_to_back() {
        let slots = WriteSlots::from_region(&region((SLOT_COUNT * SLOT_SIZE) as u64)).unwrap();
        for i in 0..SLOT_COUNT {
            assert_eq!(slots.slot(i), 0x1000 + (i * SLOT_SIZE) as u64);
        }
    }

    #[test]
    fn rejects_a_region_too_small_for_all_slots() {
        assert!(WriteSlots::from_region(&region(10)).is_err());
    }

    /// Drives a real traced child to confirm the boundary `materialize_path`
    /// enforces: a 255-byte path (plus NUL) exactly fills a slot and is
    /// written faithfully, a 256-byte path is rejected before anything is
    /// written. Needs `CAP_SYS_PTRACE`, so it's `#[ignore]`d like the other
    /// real-tracee tests.
    #[test]
    #[ignore]
    fn path_at_the_slot_boundary_fits_one_byte_over_does_not() {
        use crate::tracee::{self, TraceeEvent};

        let pid = tracee::spawn_traced("sleep", &["sleep".to_string(), "5".to_string()]).unwrap();
        tracee::attach_after_exec(pid).unwrap();
        assert_eq!(
            tracee::step_to_next_syscall_stop(pid).unwrap(),
            TraceeEvent::SyscallStop
        );

        let region = memory::first_executable_region(pid).unwrap();
        let slots = WriteSlots::from_region(&region).unwrap();

        let at_limit = vec![b'a'; MAX_PATH_LEN];
        let addr = materialize_path(pid, &slots, slot::PATH, &at_limit).unwrap();
        assert_eq!(memory::read_cstring(pid, addr).unwrap(), at_limit);

        let over_limit = vec![b'a'; MAX_PATH_LEN + 1];
        assert!(materialize_path(pid, &slots, slot::SPARE_A, &over_limit).is_err());

        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
        let _ = nix::sys::wait::waitpid(pid, None);
    }
}
