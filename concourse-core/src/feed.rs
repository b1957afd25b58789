//! Non-blocking input feeds
//!
//! Scanners and the visual-inertial tracker push data at their own pace. The
//! engines pull from a [`Feed`] until it reports `WouldBlock`, so a tick never
//! waits on a radio.
//!
//! ```rust
//! use concourse_core::feed::{Feed, MemoryFeed};
//!
//! let scans = [1u32, 2, 3];
//! let mut feed = MemoryFeed::new(&scans);
//! let mut seen = 0;
//! while let Ok(_) = feed.poll_next() {
//!     seen += 1;
//! }
//! assert_eq!(seen, 3);
//! ```

use crate::errors::FeedError;

/// Pull-based source of input records
pub trait Feed {
    /// Record type produced by this feed
    type Item;

    /// Next record, `WouldBlock` when none is ready yet
    ///
    /// `Other(FeedError::Closed)` means the feed is finished; a malformed
    /// record is reported once and the feed stays usable.
    fn poll_next(&mut self) -> nb::Result<Self::Item, FeedError>;
}

/// Feed over an in-memory slice, for tests and replay
pub struct MemoryFeed<'a, T> {
    items: &'a [T],
    position: usize,
    close_when_empty: bool,
}

impl<'a, T: Clone> MemoryFeed<'a, T> {
    /// Feed that reports `Closed` once exhausted
    pub fn new(items: &'a [T]) -> Self {
        Self {
            items,
            position: 0,
            close_when_empty: true,
        }
    }

    /// Feed that reports `WouldBlock` once exhausted, like a live scanner
    pub fn live(items: &'a [T]) -> Self {
        Self {
            items,
            position: 0,
            close_when_empty: false,
        }
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.items.len()
    }
}

impl<'a, T: Clone> Feed for MemoryFeed<'a, T> {
    type Item = T;

    fn poll_next(&mut self) -> nb::Result<T, FeedError> {
        match self.items.get(self.position) {
            Some(item) => {
                self.position += 1;
                Ok(item.clone())
            }
            None if self.close_when_empty => Err(nb::Error::Other(FeedError::Closed)),
            None => Err(nb::Error::WouldBlock),
        }
    }
}

/// Result of pulling a feed dry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedDrain {
    /// Records handed to the engine
    pub ingested: usize,
    /// Malformed records skipped
    pub malformed: usize,
    /// The feed reported `Closed`
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_feed_reports_closed() {
        let items = [10u8];
        let mut feed = MemoryFeed::new(&items);
        assert_eq!(feed.poll_next(), Ok(10));
        assert_eq!(feed.poll_next(), Err(nb::Error::Other(FeedError::Closed)));
        assert!(feed.is_exhausted());

        feed.reset();
        assert_eq!(feed.poll_next(), Ok(10));
    }

    #[test]
    fn live_feed_would_block() {
        let items: [u8; 0] = [];
        let mut feed = MemoryFeed::live(&items);
        assert_eq!(feed.poll_next(), Err(nb::Error::WouldBlock));
    }
}
