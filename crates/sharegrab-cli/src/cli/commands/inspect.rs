//! `sharegrab inspect <link>` – resolve and extract only, print JSON.

use anyhow::Result;
use serde_json::json;

use sharegrab_core::config::GrabConfig;
use sharegrab_core::{AdapterRegistry, Pipeline};

pub fn run_inspect(cfg: &GrabConfig, link: &str) -> Result<()> {
    let registry = AdapterRegistry::from_config(cfg)?;
    let http = cfg.http_client();
    let mut pipeline = Pipeline::new(&registry, &http, ".").dry_run(true);
    let outcome = pipeline.run(link)?;

    let report = json!({
        "adapter": outcome.adapter,
        "original_url": outcome.resolution.original_url,
        "final_url": outcome.resolution.final_url,
        "resource_id": outcome.resolution.resource_id,
        "hops": outcome.resolution.hops,
        "title": outcome.descriptor.title(),
        "items": outcome.descriptor.items(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
