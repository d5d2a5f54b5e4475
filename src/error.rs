//! Error type for talking to a running watch.
//!
//! Watch operations themselves never fail: bad target text simply means the
//! watch counts up. The only failures are transport ones, when the actor
//! behind a [`WatchHandle`](crate::watch::WatchHandle) is no longer there to
//! receive a command or answer a query.

use thiserror::Error;

/// Errors returned by [`WatchHandle`](crate::watch::WatchHandle) queries and
/// the `try_*` command variants.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch actor has stopped and its inbox is closed.
    #[error("watch {0} is no longer running")]
    Closed(i64),

    /// The actor stopped before answering a query.
    #[error("watch {0} dropped the reply")]
    Dropped(i64),

    /// The actor task panicked or was cancelled.
    #[error("watch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, WatchError>;
