use anyhow::Result;
use std::path::PathBuf;

use pagemark::StrategyKind;

use super::util::{config, open_writer};

pub fn exec(
    path: PathBuf,
    count: Option<usize>,
    contributor: Option<String>,
    strategy: Option<StrategyKind>,
    same_instant: bool,
) -> Result<()> {
    let svc = open_writer(&path, config(strategy))?;
    let added = if same_instant {
        svc.populate_same_instant(count, contributor.as_deref())?
    } else {
        svc.populate(count, contributor.as_deref())?
    };
    println!(
        "populated {} record(s) at {} (strategy {})",
        added.len(),
        path.display(),
        svc.strategy()
    );
    Ok(())
}
