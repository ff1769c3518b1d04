//! `capstan memory`: inspect and prune the long-term memory file.

use std::path::Path;

use capstan_core::memory::{MemoryRecord, MemoryStore};
use capstan_memory::JsonFileMemory;

fn render_entries(entries: &[MemoryRecord]) -> String {
    if entries.is_empty() {
        return "No memories stored.".into();
    }
    entries
        .iter()
        .map(|r| format!("  {}: {}", r.key, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn list(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = JsonFileMemory::open(config.memory_path());

    println!("Memory file: {}", store.path().display());
    println!("{}", render_entries(&store.entries().await?));
    Ok(())
}

pub async fn forget(config_path: Option<&Path>, key: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = JsonFileMemory::open(config.memory_path());
    println!("{}", forget_in(&store, key).await?);
    Ok(())
}

async fn forget_in(store: &dyn MemoryStore, key: &str) -> anyhow::Result<String> {
    Ok(if store.forget(key).await? {
        format!("Forgot: {key}")
    } else {
        format!("Nothing found for: {key}")
    })
}
