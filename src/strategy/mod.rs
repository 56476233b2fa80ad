//! strategy: three interchangeable ways to page newest-first over a RecordStore.
//!
//! - native.rs      : NativeCursor: resumes from the store's own serialized scan position
//! - key_range.rs   : KeyRangeCursor: (created_at, identity) bookmark, two-phase resume
//! - unique_token.rs: UniqueTokenCursor: the per-record creation token is the bookmark
//!
//! All of them fetch `page_size + 1` candidates. If the probe record exists the
//! page is trimmed and the next bookmark is built from the last record that is
//! actually returned; otherwise this is the last page and there is no bookmark.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{PagingError, PagingResult};
use crate::model::{Page, Record};
use crate::store::RecordStore;

pub mod key_range;
pub mod native;
pub mod unique_token;

pub use key_range::KeyRangeCursor;
pub use native::NativeCursor;
pub use unique_token::UniqueTokenCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Native,
    KeyRange,
    UniqueToken,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Native,
        StrategyKind::KeyRange,
        StrategyKind::UniqueToken,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Native => "native",
            StrategyKind::KeyRange => "key-range",
            StrategyKind::UniqueToken => "unique-token",
        }
    }

    /// Records appended under this strategy need a creation token.
    pub fn needs_creation_token(self) -> bool {
        matches!(self, StrategyKind::UniqueToken)
    }

    pub fn build(self) -> Box<dyn PaginationStrategy> {
        match self {
            StrategyKind::Native => Box::new(NativeCursor),
            StrategyKind::KeyRange => Box::new(KeyRangeCursor),
            StrategyKind::UniqueToken => Box::new(UniqueTokenCursor),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(StrategyKind::Native),
            "key-range" | "key_range" | "keyrange" => Ok(StrategyKind::KeyRange),
            "unique-token" | "unique_token" | "token" => Ok(StrategyKind::UniqueToken),
            other => Err(format!(
                "unknown strategy '{}' (expected native | key-range | unique-token)",
                other
            )),
        }
    }
}

pub trait PaginationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// One page newest-first, resuming strictly after `bookmark` when given.
    fn fetch_page(
        &self,
        store: &dyn RecordStore,
        bookmark: Option<&str>,
        page_size: usize,
    ) -> PagingResult<Page>;
}

pub(crate) fn check_page_size(page_size: usize) -> PagingResult<usize> {
    if page_size == 0 {
        return Err(PagingError::invalid_argument("page_size must be positive"));
    }
    Ok(page_size.saturating_add(1))
}

/// Trim a `page_size + 1` probe to a page and derive the next bookmark from
/// the last kept record.
pub(crate) fn finish_page<F>(
    mut records: Vec<Record>,
    page_size: usize,
    bookmark_of: F,
) -> PagingResult<Page>
where
    F: Fn(&Record) -> PagingResult<String>,
{
    if records.len() <= page_size {
        return Ok(Page {
            records,
            next_bookmark: None,
        });
    }
    records.truncate(page_size);
    let next_bookmark = match records.last() {
        Some(last) => Some(bookmark_of(last)?),
        None => None,
    };
    Ok(Page {
        records,
        next_bookmark,
    })
}
