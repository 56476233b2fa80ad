//! NativeCursor: hands paging to the store's own resumable scan.
//!
//! The bookmark is the store's `ScanPosition` in websafe form, so it is only
//! meaningful to a store with the same primary order.

use crate::error::{PagingError, PagingResult};
use crate::model::Page;
use crate::store::{RecordStore, ScanPosition};

use super::{check_page_size, PaginationStrategy, StrategyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCursor;

impl PaginationStrategy for NativeCursor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Native
    }

    fn fetch_page(
        &self,
        store: &dyn RecordStore,
        bookmark: Option<&str>,
        page_size: usize,
    ) -> PagingResult<Page> {
        check_page_size(page_size)?;
        let scan = store.native_scan().ok_or_else(|| {
            PagingError::Unsupported("store has no native resumable scan".to_string())
        })?;
        let start = bookmark.map(ScanPosition::from_websafe).transpose()?;

        let batch = scan
            .scan_from(start.as_ref(), page_size)
            .map_err(PagingError::store)?;
        let next_bookmark = if batch.more {
            batch.position.map(|p| p.to_websafe())
        } else {
            None
        };
        Ok(Page {
            records: batch.records,
            next_bookmark,
        })
    }
}
