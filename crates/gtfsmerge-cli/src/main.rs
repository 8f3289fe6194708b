pub mod cli;
pub mod error;
pub mod run;

pub use cli::{Cli, DetectArg, OutputFormat};

use clap::Parser;

fn main() {
    #[cfg(unix)]
    install_sigpipe_default();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run::run(&cli) {
        eprintln!("{}", e.message());
        std::process::exit(e.exit_code());
    }
}

/// Configures the global tracing subscriber: debug level with `--debug`,
/// warnings only otherwise. All log output goes to stderr so stdout stays
/// reserved for the `--format json` summary.
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resets `SIGPIPE` to its default disposition (`SIG_DFL`).
///
/// Rust's runtime ignores `SIGPIPE` by default, which causes programs that
/// write to a closed pipe (e.g. `gtfsmerge --dry-run a b out | head`) to
/// receive an `Err(BrokenPipe)` from a write call rather than being
/// terminated silently. Restoring the default disposition makes the kernel
/// terminate the process quietly when a write to a closed pipe occurs,
/// consistent with standard Unix behavior.
#[cfg(unix)]
fn install_sigpipe_default() {
    // SAFETY: signal() is safe to call during single-threaded program
    // initialization before any other threads are spawned. SIG_DFL is a
    // valid handler for SIGPIPE. The previous handler is discarded.
    //
    // The workspace denies `unsafe_code` globally; this is the minimal
    // unavoidable use of libc required for SIGPIPE handling on Unix, scoped
    // with an inline allow so the exception stays as narrow as possible.
    #[allow(unsafe_code)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
}
