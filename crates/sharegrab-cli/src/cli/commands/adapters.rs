//! `sharegrab adapters` – list adapters in selection order.

use anyhow::Result;
use sharegrab_core::config::GrabConfig;
use sharegrab_core::AdapterRegistry;

pub fn run_adapters(cfg: &GrabConfig) -> Result<()> {
    let registry = AdapterRegistry::from_config(cfg)?;
    let configured = cfg.sites.len();
    for (i, name) in registry.names().into_iter().enumerate() {
        let origin = if i < configured { "config" } else { "builtin" };
        println!("{:<3} {:<14} {}", i + 1, name, origin);
    }
    Ok(())
}
