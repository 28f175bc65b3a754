//! Script timers CLI
//!
//! Entry point for the `script-timers` binary. Parses CLI arguments,
//! installs logging and runs the requested timers on the event loop.

use clap::Parser as ClapParser;
use script_runtime::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let report = match cli.execute() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match cli.render(&report) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    if cli.json {
        println!();
    }

    if report.deadline_exceeded {
        std::process::exit(2);
    }
}
