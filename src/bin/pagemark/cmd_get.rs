use anyhow::Result;
use std::path::PathBuf;

use pagemark::PagingError;

use super::util::{config, open_reader, print_record};

pub fn exec(path: PathBuf, id: String, json: bool) -> Result<()> {
    let svc = open_reader(&path, config(None))?;
    match svc.get_record(&id) {
        Ok(r) if json => println!("{}", serde_json::to_string(&r)?),
        Ok(r) => print_record(&r),
        Err(PagingError::NotFound(_)) => println!("NOT FOUND '{}'", id),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
