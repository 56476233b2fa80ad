//! KeyRangeCursor: bookmark is `(created_at, identity)` of the last returned record.
//!
//! The store only answers single-inequality queries, so a resume is two scans:
//!
//! 1. siblings: `created_at == t && identity > id`, ascending identity;
//! 2. supplement (only if phase 1 came up short): `created_at < t`, newest first.
//!
//! Both phases together gather at most `page_size + 1` candidates.
//!
//! Records appended after a bookmark was issued show up on a later page only
//! if they sort after the bookmark. With the system clock that normally means
//! never, but a record landing in the bookmark's own microsecond with a higher
//! identity is picked up by phase 1. This race is accepted.

use log::debug;

use crate::codec::OpaqueCursorCodec;
use crate::error::{PagingError, PagingResult};
use crate::metrics::record_key_range_supplement;
use crate::model::Page;
use crate::store::RecordStore;

use super::{check_page_size, finish_page, PaginationStrategy, StrategyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyRangeCursor;

impl PaginationStrategy for KeyRangeCursor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::KeyRange
    }

    fn fetch_page(
        &self,
        store: &dyn RecordStore,
        bookmark: Option<&str>,
        page_size: usize,
    ) -> PagingResult<Page> {
        let want = check_page_size(page_size)?;

        let records = match bookmark {
            None => store
                .scan_descending_by_creation(None, want)
                .map_err(PagingError::store)?,
            Some(token) => {
                let (created_at, identity) = OpaqueCursorCodec::decode(token)?;
                let mut records = store
                    .scan_created_at(created_at, Some(&identity), want)
                    .map_err(PagingError::store)?;
                if records.len() < want {
                    record_key_range_supplement();
                    let older = store
                        .scan_descending_by_creation(Some(created_at), want - records.len())
                        .map_err(PagingError::store)?;
                    debug!(
                        "key-range: {} sibling(s) at {}, {} older record(s) added",
                        records.len(),
                        created_at,
                        older.len()
                    );
                    records.extend(older);
                }
                records
            }
        };

        finish_page(records, page_size, |last| {
            Ok(OpaqueCursorCodec::encode(last.created_at, &last.identity))
        })
    }
}
