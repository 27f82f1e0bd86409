//! CLI for sharegrab.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sharegrab_core::config;
use std::path::PathBuf;

use commands::{run_adapters, run_grab, run_inspect, GrabArgs};

/// Download the media behind share links.
#[derive(Debug, Parser)]
#[command(name = "sharegrab")]
#[command(about = "sharegrab: resolve share links and download the media behind them", long_about = None)]
pub struct Cli {
    /// More log detail (-v: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve, extract and download one or more share links.
    Grab {
        /// Share URLs or pasted share text.
        links: Vec<String>,

        /// File with one link per line (blank lines and `#` comments skipped).
        #[arg(long, value_name = "FILE")]
        list: Option<PathBuf>,

        /// Output directory (default: config `download_dir`, then the current dir).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Links processed in parallel (default: config `concurrency`).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Stop starting new links after the first failure.
        #[arg(long)]
        fail_fast: bool,
    },

    /// Resolve and extract one link without downloading; print the result as JSON.
    Inspect {
        link: String,
    },

    /// List adapters in selection order.
    Adapters,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Grab {
                links,
                list,
                dir,
                jobs,
                fail_fast,
            } => run_grab(
                &cfg,
                GrabArgs {
                    links,
                    list,
                    dir,
                    jobs,
                    fail_fast,
                },
            )?,
            CliCommand::Inspect { link } => run_inspect(&cfg, &link)?,
            CliCommand::Adapters => run_adapters(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
