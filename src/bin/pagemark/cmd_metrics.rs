use anyhow::Result;
use std::path::PathBuf;

use pagemark::metrics::metrics_snapshot;

use super::util::{config, open_reader};

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    // Counters are per process; opening the store replays the journal.
    let _svc = open_reader(&path, config(None))?;
    let m = metrics_snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&m)?);
        return Ok(());
    }

    println!("journal:");
    println!("  frames_replayed: {}", m.journal_frames_replayed);
    println!("  torn_tails:      {}", m.journal_torn_tails);
    println!("  frames_written:  {}", m.journal_frames_written);
    println!("  bytes_written:   {}", m.journal_bytes_written);
    println!("  fsyncs:          {}", m.journal_fsyncs);
    println!("paging:");
    println!("  pages_total:     {}", m.pages_total());
    println!("  avg_page_len:    {:.2}", m.avg_page_len());
    println!("  bookmarks_rejected: {}", m.bookmarks_rejected);
    println!("writes:");
    println!("  records_appended:    {}", m.records_appended);
    println!("  sequences_allocated: {}", m.sequences_allocated);
    println!("  allocator_retries:   {}", m.allocator_retries);
    Ok(())
}
