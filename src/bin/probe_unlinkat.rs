//! Calls `unlinkat(2)` directly against a directory fd and a bare relative
//! filename. Forces the interposer's `Unlinkat` dispatch arm (rather than
//! relying on whichever syscall a shell's `rm` happens to pick) so tests
//! can check that only the path argument gets rewritten, not the dirfd.

use std::ffi::CString;
use std::os::unix::io::AsRawFd;

fn main() {
    let mut args = std::env::args().skip(1);
    let dir = args.next().expect("usage: probe_unlinkat <dir> <name>");
    let name = args.next().expect("usage: probe_unlinkat <dir> <name>");

    let dir_file = std::fs::File::open(&dir).expect("opening directory");
    let c_name = CString::new(name).unwrap();

    let rc = unsafe { libc::unlinkat(dir_file.as_raw_fd(), c_name.as_ptr(), 0) };
    std::process::exit(if rc == 0 { 0 } else { 1 });
}
