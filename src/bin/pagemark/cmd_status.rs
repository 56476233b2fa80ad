use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use pagemark::RecordStore;

use super::util::{config, open_reader};

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let cfg = config(None);
    let svc = open_reader(&path, cfg.clone())?;
    let store = svc.store();
    let records = store.len()?;
    let contributors = store.contributor_count();
    let journal_bytes = std::fs::metadata(store.journal_path())?.len();
    let newest = store.scan_descending_by_creation(None, 1)?.into_iter().next();

    if json {
        let v = json!({
            "path": path.display().to_string(),
            "records": records,
            "contributors": contributors,
            "journal_bytes": journal_bytes,
            "newest_created_at": newest.as_ref().map(|r| r.created_at.to_string()),
            "config": {
                "default_page_size": cfg.default_page_size,
                "strategy": cfg.strategy,
                "allocator_max_retries": cfg.allocator_max_retries,
                "contributor_shards": cfg.contributor_shards,
            },
        });
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }

    println!("pagemark status at {}", path.display());
    println!("  records:       {}", records);
    println!("  contributors:  {}", contributors);
    println!("  journal bytes: {}", journal_bytes);
    match newest {
        Some(r) => println!("  newest:        {} ({})", r.identity, r.created_at),
        None => println!("  newest:        -"),
    }
    println!("  {}", cfg);
    Ok(())
}
