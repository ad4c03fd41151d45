//! Command-line parsing: flags before `--`, the traced program and its own
//! arguments after it.

use std::path::PathBuf;

use structopt::StructOpt;

use crate::error::FssbError;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "fssb",
    about = "FSSB is a filesystem sandbox for Linux. It's useful if you want to run a program but also protect your files and directories from modification."
)]
struct Flags {
    /// remove all temporary files at the end
    #[structopt(short = "r")]
    cleanup: bool,

    /// logging output file (stderr by default)
    #[structopt(short = "o", parse(from_os_str))]
    log_file: Option<PathBuf>,

    /// debug output file (off by default)
    #[structopt(short = "d", parse(from_os_str))]
    debug_file: Option<PathBuf>,

    /// print file to proxyfile map at the end
    #[structopt(short = "m")]
    print_map: bool,
}

/// Fully parsed invocation: the tracer's own flags plus the traced
/// program and its arguments.
#[derive(Debug)]
pub struct Invocation {
    pub cleanup: bool,
    pub log_file: Option<PathBuf>,
    pub debug_file: Option<PathBuf>,
    pub print_map: bool,
    pub program: String,
    pub program_args: Vec<String>,
}

/// Parses `args` (not including argv[0]). Handles `-h` specially, since it
/// must be the sole argument to be unambiguous, and prints its own usage
/// diagnostics rather than delegating to `structopt`'s, to match the
/// tracer's established wording.
pub fn parse(args: &[String]) -> Result<Invocation, FssbError> {
    if args.iter().any(|a| a == "-h") {
        if args.len() != 1 {
            eprintln!("`-h` must be the only argument if it is used.\n");
        }
        print_help();
        std::process::exit(0);
    }

    let dd_pos = args.iter().position(|a| a == "--").ok_or_else(|| {
        FssbError::Usage(
            "no `--` found in arguments\nusage: fssb -- <program> <args>".to_string(),
        )
    })?;

    if dd_pos == args.len() - 1 {
        return Err(FssbError::Usage(
            "nothing found after `--`\nusage: fssb -- <program> <args>".to_string(),
        ));
    }

    let flag_args = &args[..dd_pos];
    let mut i = 0;
    while i < flag_args.len() {
        match flag_args[i].as_str() {
            "-r" | "-m" => i += 1,
            "-o" | "-d" => i += 2,
            other => return Err(FssbError::Usage(format!("invalid option '{}'", other))),
        }
    }

    let mut argv = vec!["fssb".to_string()];
    argv.extend_from_slice(flag_args);
    let flags = Flags::from_iter_safe(argv).map_err(|e| FssbError::Usage(e.message))?;

    let rest = &args[dd_pos + 1..];
    let program = rest[0].clone();
    let program_args = rest.to_vec();

    Ok(Invocation {
        cleanup: flags.cleanup,
        log_file: flags.log_file,
        debug_file: flags.debug_file,
        print_map: flags.print_map,
        program,
        program_args,
    })
}

fn print_help() {
    println!("Usage: fssb [OPTIONS] -- COMMAND");
    println!();
    println!(
        "FSSB is a filesystem sandbox for Linux. It's useful if you want to run a\n\
program but also protect your files and directories from modification.\n"
    );
    println!("  -d ARG          debug output file (off by default)");
    println!("  -h              show this help and exit");
    println!("  -m              print file to proxyfile map at the end");
    println!("  -o ARG          logging output file (stderr by default)");
    println!("  -r              remove all temporary files at the end");
    println!();
    println!("You can find a more complete at https://github.com/adtac/fssb");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_missing_separator() {
        let err = parse(&args(&["-r", "echo", "hi"])).unwrap_err();
        assert!(matches!(err, FssbError::Usage(_)));
    }

    #[test]
    fn rejects_empty_command_after_separator() {
        let err = parse(&args(&["-r", "--"])).unwrap_err();
        assert!(matches!(err, FssbError::Usage(_)));
    }

    #[test]
    fn rejects_unknown_flag() {
        let err = parse(&args(&["--bogus", "--", "echo"])).unwrap_err();
        assert!(matches!(err, FssbError::Usage(_)));
    }

    #[test]
    fn parses_flags_and_command() {
        let inv = parse(&args(&["-r", "-m", "--", "echo", "hi"])).unwrap();
        assert!(inv.cleanup);
        assert!(inv.print_map);
        assert_eq!(inv.program, "echo");
        assert_eq!(inv.program_args, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn parses_log_file_paths() {
        let inv = parse(&args(&["-o", "/tmp/log", "-d", "/tmp/dbg", "--", "true"])).unwrap();
        assert_eq!(inv.log_file, Some(PathBuf::from("/tmp/log")));
        assert_eq!(inv.debug_file, Some(PathBuf::from("/tmp/dbg")));
    }
}
