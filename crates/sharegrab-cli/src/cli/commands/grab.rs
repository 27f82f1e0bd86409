//! `sharegrab grab <link>...` – resolve, extract and download share links.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use sharegrab_core::config::GrabConfig;
use sharegrab_core::pipeline::batch::{run_batch, BatchResult};
use sharegrab_core::{AdapterRegistry, CancelToken};

#[derive(Debug, Default)]
pub struct GrabArgs {
    pub links: Vec<String>,
    pub list: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub fail_fast: bool,
}

pub fn run_grab(cfg: &GrabConfig, args: GrabArgs) -> Result<()> {
    let mut inputs = args.links;
    if let Some(list) = &args.list {
        inputs.extend(read_link_list(list)?);
    }
    if inputs.is_empty() {
        bail!("no links given (pass links as arguments or use --list FILE)");
    }

    let dest_dir = resolve_dest_dir(args.dir, cfg)?;
    let jobs = args.jobs.unwrap_or(cfg.concurrency).max(1);
    let registry = AdapterRegistry::from_config(cfg)?;
    let http = cfg.http_client();
    tracing::info!(links = inputs.len(), jobs, dir = %dest_dir.display(), "grab started");

    let cancel = CancelToken::new();
    let results = run_batch(&registry, &http, &dest_dir, &inputs, jobs, &cancel, args.fail_fast);
    let failed = results.iter().filter(|r| r.result.is_err()).count();
    for result in &results {
        println!("{}", format_result(result));
    }

    if failed > 0 {
        bail!("{failed} of {} links failed", results.len());
    }
    Ok(())
}

/// One line per link: `ok <paths>` or `failed at <stage>: <kind>: <msg>`.
pub fn format_result(result: &BatchResult) -> String {
    match &result.result {
        Ok(outcome) => {
            let paths: Vec<String> = outcome
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            format!("ok {}", paths.join(" "))
        }
        Err(err) => format!("failed at {}: {}: {}", err.stage, err.kind(), err.source),
    }
}

/// Links from a list file: one per line, blank lines and `#` comments skipped.
pub fn read_link_list(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading link list {}", path.display()))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// `--dir`, then config `download_dir`, then the current directory.
pub fn resolve_dest_dir(dir: Option<PathBuf>, cfg: &GrabConfig) -> Result<PathBuf> {
    match dir.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}
