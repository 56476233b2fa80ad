//! Centralized configuration and builder for the paging service.
//!
//! - `PagingConfig::default()` never touches the environment; the library
//!   reads no env vars on its own.
//! - `PagingConfig::from_env()` is the explicit opt-in used by the CLI.
//! - `ServiceBuilder` collects a config plus the optional clock overrides and
//!   produces a `PagingService`.
//!
//! Env:
//! - PAGEMARK_PAGE_SIZE           default page size (default 5)
//! - PAGEMARK_STRATEGY            native | key-range | unique-token (default key-range)
//! - PAGEMARK_ALLOC_MAX_RETRIES   allocator retry bound on contention (default 16)
//! - PAGEMARK_CONTRIBUTOR_SHARDS  contributor shard count for stores (default 16)

use std::fmt;
use std::sync::Arc;

use crate::allocator::ShardedSequenceAllocator;
use crate::clock::{Clock, MonotonicClock, SystemClock};
use crate::service::PagingService;
use crate::store::RecordStore;
use crate::strategy::StrategyKind;

/// Five suggestions per page.
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const DEFAULT_ALLOC_MAX_RETRIES: u32 = 16;
pub const DEFAULT_CONTRIBUTOR_SHARDS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagingConfig {
    /// Page size used when a caller does not pass one (CLI, populate default).
    pub default_page_size: usize,

    /// Strategy the service pages with.
    pub strategy: StrategyKind,

    /// How many times `next_sequence` re-runs its read-increment-write cycle
    /// after losing a compare-and-set before giving up.
    pub allocator_max_retries: u32,

    /// Number of contributor shards a store is created with.
    pub contributor_shards: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            strategy: StrategyKind::KeyRange,
            allocator_max_retries: DEFAULT_ALLOC_MAX_RETRIES,
            contributor_shards: DEFAULT_CONTRIBUTOR_SHARDS,
        }
    }
}

impl PagingConfig {
    /// Defaults overridden by PAGEMARK_* variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("PAGEMARK_PAGE_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.default_page_size = n;
                }
            }
        }

        if let Ok(v) = std::env::var("PAGEMARK_STRATEGY") {
            if let Ok(kind) = v.trim().parse::<StrategyKind>() {
                cfg.strategy = kind;
            }
        }

        if let Ok(v) = std::env::var("PAGEMARK_ALLOC_MAX_RETRIES") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.allocator_max_retries = n;
            }
        }

        if let Ok(v) = std::env::var("PAGEMARK_CONTRIBUTOR_SHARDS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.contributor_shards = n;
                }
            }
        }

        cfg
    }

    pub fn with_default_page_size(mut self, n: usize) -> Self {
        self.default_page_size = n;
        self
    }

    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.strategy = kind;
        self
    }

    pub fn with_allocator_max_retries(mut self, n: u32) -> Self {
        self.allocator_max_retries = n;
        self
    }

    pub fn with_contributor_shards(mut self, n: usize) -> Self {
        self.contributor_shards = n.max(1);
        self
    }
}

impl fmt::Display for PagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PagingConfig {{ default_page_size: {}, strategy: {}, allocator_max_retries: {}, contributor_shards: {} }}",
            self.default_page_size, self.strategy, self.allocator_max_retries, self.contributor_shards,
        )
    }
}

/// Builder for `PagingService`.
pub struct ServiceBuilder {
    cfg: PagingConfig,
    token_clock: Option<Arc<dyn Clock>>,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self {
            cfg: PagingConfig::default(),
            token_clock: None,
        }
    }
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, cfg: PagingConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn strategy(mut self, kind: StrategyKind) -> Self {
        self.cfg.strategy = kind;
        self
    }

    pub fn default_page_size(mut self, n: usize) -> Self {
        self.cfg.default_page_size = n;
        self
    }

    pub fn allocator_max_retries(mut self, n: u32) -> Self {
        self.cfg.allocator_max_retries = n;
        self
    }

    /// Clock used for the timestamp prefix of creation tokens.
    /// Defaults to `MonotonicClock<SystemClock>`.
    pub fn token_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.token_clock = Some(clock);
        self
    }

    pub fn build<S: RecordStore + 'static>(self, store: Arc<S>) -> PagingService<S> {
        let clock = self
            .token_clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new(SystemClock)));
        let allocator = ShardedSequenceAllocator::new(clock, self.cfg.allocator_max_retries);
        PagingService::from_parts(store, allocator, self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_page_five_with_key_range() {
        let cfg = PagingConfig::default();
        assert_eq!(cfg.default_page_size, 5);
        assert_eq!(cfg.strategy, StrategyKind::KeyRange);
        assert!(cfg.to_string().contains("key-range"));
    }

    #[test]
    fn fluent_setters_override() {
        let cfg = PagingConfig::default()
            .with_default_page_size(20)
            .with_strategy(StrategyKind::UniqueToken)
            .with_allocator_max_retries(3)
            .with_contributor_shards(0);
        assert_eq!(cfg.default_page_size, 20);
        assert_eq!(cfg.strategy, StrategyKind::UniqueToken);
        assert_eq!(cfg.allocator_max_retries, 3);
        assert_eq!(cfg.contributor_shards, 1);
    }
}
