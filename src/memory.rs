//! Reading and writing a traced process's memory, plus locating the mapped
//! region used as scratch space for rewritten syscall arguments.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::mem::size_of;

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::FssbError;

const WORD_SIZE: usize = size_of::<usize>();

/// Upper bound on the length of a string read out of tracee memory. Mirrors
/// `PATH_MAX`; nothing fssb rewrites is ever longer than a path.
pub const MAX_STRING_LEN: usize = 4096;

/// Reads a NUL-terminated byte string out of the tracee's address space,
/// one word at a time via `PTRACE_PEEKDATA`, stopping at the first NUL or
/// after `MAX_STRING_LEN` bytes (whichever comes first).
pub fn read_cstring(pid: Pid, addr: u64) -> Result<Vec<u8>, FssbError> {
    let mut bytes = Vec::with_capacity(64);
    let mut offset: u64 = 0;

    'outer: while bytes.len() < MAX_STRING_LEN {
        let word = ptrace::read(pid, (addr + offset) as ptrace::AddressType)
            .map_err(FssbError::Ptrace)?;
        let word_bytes = (word as i64).to_ne_bytes();
        for &b in &word_bytes {
            if b == 0 {
                break 'outer;
            }
            bytes.push(b);
            if bytes.len() >= MAX_STRING_LEN {
                break 'outer;
            }
        }
        offset += WORD_SIZE as u64;
    }
    Ok(bytes)
}

/// Writes `data` plus a trailing NUL into the tracee's address space at
/// `addr`, one word at a time via `PTRACE_POKEDATA`. `data.len() + 1` must
/// fit within the caller-supplied scratch slot; this function does not
/// itself enforce a size limit.
pub fn write_cstring(pid: Pid, addr: u64, data: &[u8]) -> Result<(), FssbError> {
    let mut buf = data.to_vec();
    buf.push(0);
    // Pad to a whole number of words so the final POKEDATA doesn't clobber
    // bytes past the NUL with uninitialized data; the padding bytes are
    // copies of whatever already occupies the tail word, read back first.
    while buf.len() % WORD_SIZE != 0 {
        buf.push(0);
    }

    for (i, chunk) in buf.chunks(WORD_SIZE).enumerate() {
        let mut word_bytes = [0u8; WORD_SIZE];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        let word = usize::from_ne_bytes(word_bytes) as i64;
        unsafe {
            ptrace::write(
                pid,
                (addr + (i * WORD_SIZE) as u64) as ptrace::AddressType,
                word as *mut std::ffi::c_void,
            )
            .map_err(FssbError::Ptrace)?;
        }
    }
    Ok(())
}

/// A mapped region of the tracee's address space, parsed from one line of
/// `/proc/<pid>/maps`.
#[derive(Debug, Clone)]
pub struct MappedRegion {
    pub start: u64,
    pub end: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub private: bool,
}

/// Finds the first mapped region in the tracee that is readable, executable,
/// and private (`r-xp`) — the loaded text segment of the tracee's own
/// executable, whose first bytes are overwritten with known instruction
/// encodings to build scratch write slots.
pub fn first_executable_region(pid: Pid) -> Result<MappedRegion, FssbError> {
    let path = format!("/proc/{}/maps", pid);
    let file = File::open(&path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        if let Some(region) = parse_maps_line(&line) {
            if region.readable && region.executable && region.private {
                return Ok(region);
            }
        }
    }
    Err(FssbError::NoExecutableRegion { pid: pid.as_raw() })
}

fn parse_maps_line(line: &str) -> Option<MappedRegion> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;

    let (start_str, end_str) = range.split_once('-')?;
    let start = u64::from_str_radix(start_str, 16).ok()?;
    let end = u64::from_str_radix(end_str, 16).ok()?;

    let mut chars = perms.chars();
    let readable = chars.next()? == 'r';
    let writable = chars.next()? == 'w';
    let executable = chars.next()? == 'x';
    let private = chars.next()? == 'p';

    Some(MappedRegion {
        start,
        end,
        readable,
        writable,
        executable,
        private,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_maps_line() {
        let line = "00400000-00452000 r-xp 00000000 08:02 173521 /bin/cat";
        let region = parse_maps_line(line).unwrap();
        assert_eq!(region.start, 0x0040_0000);
        assert_eq!(region.end, 0x0045_2000);
        assert!(region.readable);
        assert!(!region.writable);
        assert!(region.executable);
        assert!(region.private);
    }

    #[test]
    fn parses_a_shared_writable_region() {
        let line = "7f1234500000-7f1234600000 rw-s 00000000 00:00 0";
        let region = parse_maps_line(line).unwrap();
        assert!(region.readable);
        assert!(region.writable);
        assert!(!region.executable);
        assert!(!region.private);
    }

    #[test]
    fn rejects_a_malformed_line() {
        assert!(parse_maps_line("not a maps line").is_none());
    }
}
