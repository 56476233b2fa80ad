//! PagingService: the entry point callers hold (usually behind an `Arc`).
//!
//! Wires a RecordStore, the configured strategy and the sequence allocator.
//! Validation happens here, before any store access; store failures are
//! mapped to `PagingError::StoreUnavailable`.

use log::{debug, info};
use std::sync::Arc;

use crate::allocator::ShardedSequenceAllocator;
use crate::config::{PagingConfig, ServiceBuilder};
use crate::error::{PagingError, PagingResult};
use crate::metrics::{record_bookmark_rejected, record_page_served};
use crate::model::{NewRecord, Page, Record};
use crate::store::RecordStore;
use crate::strategy::{PaginationStrategy, StrategyKind};

pub struct PagingService<S: RecordStore> {
    store: Arc<S>,
    strategy: Box<dyn PaginationStrategy>,
    allocator: ShardedSequenceAllocator,
    cfg: PagingConfig,
}

impl<S: RecordStore + 'static> PagingService<S> {
    /// Service with default config (key-range paging) over `store`.
    pub fn new(store: Arc<S>) -> Self {
        ServiceBuilder::new().build(store)
    }
}

impl<S: RecordStore> PagingService<S> {
    pub fn from_parts(store: Arc<S>, allocator: ShardedSequenceAllocator, cfg: PagingConfig) -> Self {
        debug!("paging service: {}", cfg);
        Self {
            store,
            strategy: cfg.strategy.build(),
            allocator,
            cfg,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &PagingConfig {
        &self.cfg
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Append one record. Under unique-token paging `contributor` is required
    /// and the creation token is allocated before the record is persisted.
    pub fn append_record(&self, text: &str, contributor: Option<&str>) -> PagingResult<Record> {
        self.append_draft(NewRecord::new(text), contributor)
    }

    fn append_draft(&self, mut draft: NewRecord, contributor: Option<&str>) -> PagingResult<Record> {
        if self.strategy.kind().needs_creation_token() {
            let who = contributor
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    PagingError::invalid_argument(
                        "contributor identity is required for unique-token paging",
                    )
                })?;
            let token = self
                .allocator
                .derive_creation_token(self.store.as_ref(), who)?;
            draft = draft.with_creation_token(token);
        }
        let record = self.store.append(draft).map_err(PagingError::store)?;
        debug!("appended record {} at {}", record.identity, record.created_at);
        Ok(record)
    }

    /// One page, resuming after `bookmark`. An empty bookmark means "from the start".
    pub fn get_page(&self, bookmark: Option<&str>, page_size: usize) -> PagingResult<Page> {
        if page_size == 0 {
            return Err(PagingError::invalid_argument("page_size must be positive"));
        }
        let bookmark = bookmark.filter(|b| !b.is_empty());
        let page = self
            .strategy
            .fetch_page(self.store.as_ref(), bookmark, page_size)
            .map_err(|e| {
                if let PagingError::InvalidBookmark(cause) = &e {
                    record_bookmark_rejected();
                    debug!("rejected bookmark: {}", cause);
                }
                e
            })?;
        record_page_served(self.strategy.kind(), page.len());
        Ok(page)
    }

    pub fn first_page(&self, page_size: usize) -> PagingResult<Page> {
        self.get_page(None, page_size)
    }

    /// Append `count` sample records "Suggestion 0", "Suggestion 1", ...
    /// `None` appends one more than the default page size.
    pub fn populate(
        &self,
        count: Option<usize>,
        contributor: Option<&str>,
    ) -> PagingResult<Vec<Record>> {
        self.populate_with(count, contributor, false)
    }

    /// Like `populate`, but every record shares the first one's `created_at`,
    /// so key-range paging has to split pages inside a run of equal timestamps.
    pub fn populate_same_instant(
        &self,
        count: Option<usize>,
        contributor: Option<&str>,
    ) -> PagingResult<Vec<Record>> {
        self.populate_with(count, contributor, true)
    }

    fn populate_with(
        &self,
        count: Option<usize>,
        contributor: Option<&str>,
        same_instant: bool,
    ) -> PagingResult<Vec<Record>> {
        let count = count.unwrap_or(self.cfg.default_page_size + 1);
        let mut out: Vec<Record> = Vec::new();
        for i in 0..count {
            let mut draft = NewRecord::new(format!("Suggestion {}", i));
            if same_instant {
                if let Some(first) = out.first() {
                    draft = draft.with_created_at(first.created_at);
                }
            }
            out.push(self.append_draft(draft, contributor)?);
        }
        info!(
            "populated {} record(s){}",
            out.len(),
            if same_instant { " at one instant" } else { "" }
        );
        Ok(out)
    }

    pub fn get_record(&self, identity: &str) -> PagingResult<Record> {
        self.store
            .get(identity)
            .map_err(PagingError::store)?
            .ok_or_else(|| PagingError::NotFound(identity.to_string()))
    }
}
