//! Error taxonomy of the paging surface.
//!
//! Store, journal and lock code work with `anyhow::Result` and attach context
//! to I/O failures. Everything that crosses `PagingService` (and the
//! strategies) is mapped into `PagingError` so callers can tell "retry with
//! other input" apart from "the store is gone".

use thiserror::Error;

use crate::codec::CursorError;

#[derive(Debug, Error)]
pub enum PagingError {
    /// Rejected before touching the store (page size 0, missing contributor, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The bookmark could not be decoded by the active strategy.
    #[error("invalid bookmark: {0}")]
    InvalidBookmark(#[from] CursorError),

    /// Point lookup miss.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The configured strategy needs a store capability that is missing.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Store failure, including exhausted allocator retries. Not retried here.
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },
}

impl PagingError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        PagingError::InvalidArgument(msg.into())
    }

    /// Map a store-layer error, keeping the whole context chain in the message.
    pub fn store(err: anyhow::Error) -> Self {
        PagingError::StoreUnavailable {
            message: format!("{:#}", err),
        }
    }

    /// Recoverable by the caller without operator intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PagingError::StoreUnavailable { .. } | PagingError::Unsupported(_))
    }
}

pub type PagingResult<T> = std::result::Result<T, PagingError>;
