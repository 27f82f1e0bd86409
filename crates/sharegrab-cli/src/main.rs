use clap::Parser;
use sharegrab_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Log file first; stderr when the state dir is unusable.
    if let Err(err) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr(cli.verbose);
        tracing::warn!("log file unavailable, logging to stderr: {err:#}");
    }

    if let Err(err) = cli.run() {
        eprintln!("sharegrab error: {:#}", err);
        std::process::exit(1);
    }
}
