use clap::Parser;
use tailtrace::{Cli, run};

fn main() {
    // Dump output is routinely piped into pagers that exit early; restore
    // the default SIGPIPE disposition so the write terminates the process
    // quietly instead of panicking.
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
