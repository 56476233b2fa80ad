use anyhow::Result;
use std::path::PathBuf;

use pagemark::StrategyKind;

use super::util::{config, open_reader, print_record};

pub fn exec(
    path: PathBuf,
    bookmark: Option<String>,
    page_size: Option<usize>,
    strategy: Option<StrategyKind>,
    json: bool,
) -> Result<()> {
    let cfg = config(strategy);
    let size = page_size.unwrap_or(cfg.default_page_size);
    let svc = open_reader(&path, cfg)?;
    let page = svc.get_page(bookmark.as_deref(), size)?;

    if json {
        println!("{}", serde_json::to_string(&page)?);
        return Ok(());
    }

    for r in &page.records {
        print_record(r);
    }
    match &page.next_bookmark {
        Some(b) => println!("next: {}", b),
        None => println!("next: (end)"),
    }
    Ok(())
}
