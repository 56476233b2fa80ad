use anyhow::Result;
use std::path::PathBuf;

use pagemark::StrategyKind;

use super::util::{config, open_writer, print_record};

pub fn exec(
    path: PathBuf,
    text: String,
    contributor: Option<String>,
    strategy: Option<StrategyKind>,
    json: bool,
) -> Result<()> {
    let svc = open_writer(&path, config(strategy))?;
    let rec = svc.append_record(&text, contributor.as_deref())?;
    if json {
        println!("{}", serde_json::to_string(&rec)?);
    } else {
        print_record(&rec);
    }
    Ok(())
}
