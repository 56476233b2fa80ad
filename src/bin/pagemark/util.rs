use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use pagemark::{JournalStore, PagingConfig, PagingService, Record, ServiceBuilder, StrategyKind};

/// Env config with an optional per-command strategy override.
pub fn config(strategy: Option<StrategyKind>) -> PagingConfig {
    let cfg = PagingConfig::from_env();
    match strategy {
        Some(kind) => cfg.with_strategy(kind),
        None => cfg,
    }
}

pub fn open_writer(path: &Path, cfg: PagingConfig) -> Result<PagingService<JournalStore>> {
    let store = JournalStore::open_with(
        path,
        Arc::new(pagemark::SystemClock),
        cfg.contributor_shards,
    )?;
    Ok(ServiceBuilder::new().config(cfg).build(Arc::new(store)))
}

pub fn open_reader(path: &Path, cfg: PagingConfig) -> Result<PagingService<JournalStore>> {
    let store = JournalStore::open_read_only(path)?;
    Ok(ServiceBuilder::new().config(cfg).build(Arc::new(store)))
}

pub fn print_record(r: &Record) {
    match &r.creation_token {
        Some(tok) => println!("{}  {}  {}  [{}]", r.identity, r.created_at, r.text, tok),
        None => println!("{}  {}  {}", r.identity, r.created_at, r.text),
    }
}
