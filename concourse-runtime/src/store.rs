//! Read-copy-update snapshot store
//!
//! Readers take an `Arc` snapshot and never block each other or the writer
//! for longer than a pointer clone. Writers build a modified copy and swap
//! it in; a snapshot taken before the swap stays valid and unchanged.
//!
//! ```rust
//! use concourse_runtime::store::Shared;
//!
//! let board = Shared::new(vec![1, 2, 3]);
//! let before = board.load();
//! board.update(|v| v.push(4));
//!
//! assert_eq!(*before, vec![1, 2, 3]);
//! assert_eq!(*board.load(), vec![1, 2, 3, 4]);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct Shared<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the snapshot
    pub fn store(&self, value: T) {
        self.store_arc(Arc::new(value));
    }

    pub fn store_arc(&self, value: Arc<T>) {
        *self.current.write() = value;
    }
}

impl<T: Clone> Shared<T> {
    /// Copies the snapshot, applies `f` and swaps the copy in
    ///
    /// The write lock is held for the whole update, so concurrent updates
    /// never lose each other's changes.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.current.write();
        let mut next = T::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}
