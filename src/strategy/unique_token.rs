//! UniqueTokenCursor: the record's creation token is both sort key and bookmark.
//!
//! Only records appended with a token are visible to this strategy.

use crate::allocator::is_creation_token;
use crate::codec::CursorError;
use crate::error::{PagingError, PagingResult};
use crate::model::Page;
use crate::store::RecordStore;

use super::{check_page_size, finish_page, PaginationStrategy, StrategyKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueTokenCursor;

impl PaginationStrategy for UniqueTokenCursor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UniqueToken
    }

    fn fetch_page(
        &self,
        store: &dyn RecordStore,
        bookmark: Option<&str>,
        page_size: usize,
    ) -> PagingResult<Page> {
        let want = check_page_size(page_size)?;
        if let Some(token) = bookmark {
            if !is_creation_token(token) {
                return Err(CursorError::Format(format!(
                    "not a creation token: {:?}",
                    token.chars().take(64).collect::<String>()
                ))
                .into());
            }
        }

        let records = store
            .scan_by_creation_token(bookmark, want)
            .map_err(PagingError::store)?;

        finish_page(records, page_size, |last| {
            last.creation_token
                .clone()
                .ok_or_else(|| PagingError::StoreUnavailable {
                    message: format!("record {} has no creation token", last.identity),
                })
        })
    }
}
