use std::process::ExitCode;

use anyhow::{Context, Result};

use fssb::{cli, interposer, log_sink, sandbox, session::Session, tracee};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fssb: error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    log_sink::init_diagnostics_logger();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse(&raw_args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("fssb: error: {}", e);
            return Ok(ExitCode::from(1));
        }
    };

    let log_sink = log_sink::open_log_sink(invocation.log_file.as_deref())
        .context("opening log output file")?;
    let debug_sink = log_sink::open_debug_sink(invocation.debug_file.as_deref())
        .context("opening debug output file")?;
    let sandbox_dir = sandbox::create_sandbox_dir().context("creating sandbox directory")?;

    let mut session = Session::new(
        sandbox_dir,
        log_sink,
        debug_sink,
        invocation.cleanup,
        invocation.print_map,
    );

    let pid = tracee::spawn_traced(&invocation.program, &invocation.program_args)
        .context("spawning the traced child")?;

    tracee::attach_after_exec(pid).context("attaching to traced child")?;
    interposer::run(&mut session, pid).context("running the syscall interposer")?;
    session.finish().context("writing proxy map / cleaning up sandbox")?;

    Ok(ExitCode::SUCCESS)
}
