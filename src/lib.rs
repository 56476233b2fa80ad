// Ambient layers
pub mod config;
pub mod metrics;
pub mod error;
pub mod clock;
pub mod hash;
pub mod lock;

// Data model and bookmark codecs
pub mod model;
pub mod codec;

// Storage: trait + in-memory and journal-backed implementations
pub mod store; // src/store/{mod,index,memory,journal,durable}.rs

// Sequence allocation for creation tokens
pub mod allocator;

// Paging strategies and the service that drives them
pub mod strategy; // src/strategy/{mod,native,key_range,unique_token}.rs
pub mod service;

// Convenience re-exports
pub use allocator::ShardedSequenceAllocator;
pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use codec::{CursorError, OpaqueCursorCodec};
pub use config::{PagingConfig, ServiceBuilder};
pub use error::{PagingError, PagingResult};
pub use model::{Contributor, NewRecord, Page, Record, Timestamp};
pub use service::PagingService;
pub use store::{
    ContributorLedger, JournalStore, MemoryStore, NativeBatch, NativeScan, RecordStore,
    ScanPosition,
};
pub use strategy::{
    KeyRangeCursor, NativeCursor, PaginationStrategy, StrategyKind, UniqueTokenCursor,
};
