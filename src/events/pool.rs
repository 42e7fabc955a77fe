//! The event-pool seam.
//!
//! The core never allocates [`Event`] objects itself: every emission
//! borrows from an external allocator and the consumer returns the object
//! once processed. A failed borrow is a drop, not a crash.

use super::Event;
use crate::error::VenueError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// External event allocator.
#[async_trait]
pub trait EventPool: Send + Sync {
    /// Borrow an event object, blocking until one is available or the
    /// context is cancelled.
    ///
    /// # Errors
    /// [`VenueError::PoolExhausted`] when the pool cannot lend (the caller
    /// drops the intended payload), or [`VenueError::Cancelled`] when the
    /// wait was cancelled.
    async fn borrow_event(&self, cancel: &CancellationToken) -> Result<Box<Event>, VenueError>;

    /// Hand an event object back after the consumer is done with it.
    fn return_event(&self, event: Box<Event>);
}
