//! All-or-nothing bulk construction.
//!
//! A [`RingBuilder`] owns a private ring that elements are appended to one
//! at a time. It is only handed out by [`finish`](RingBuilder::finish);
//! dropping the builder early (error return or unwinding) drops the partial
//! ring, which destroys every element built so far and returns its storage.

use crate::{AllocError, Allocator, BuildError, Key, Ring};

pub(crate) struct RingBuilder<T, A: Allocator, K: Key> {
    ring: Ring<T, A, K>,
}

impl<T, A: Allocator, K: Key> RingBuilder<T, A, K> {
    /// Starts a build with storage for `capacity` nodes reserved up front.
    pub(crate) fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        Ok(Self {
            ring: Ring::try_with_capacity_in(capacity, alloc)?,
        })
    }

    /// Appends the element produced by `produce`.
    ///
    /// Element failures are tagged with the number of elements built before
    /// this one.
    #[inline]
    pub(crate) fn push_with<E, F>(&mut self, produce: F) -> Result<(), BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let index = self.ring.len();
        self.ring.try_push_back_with(produce).map_err(|err| match err {
            BuildError::Element { error, .. } => BuildError::Element { index, error },
            alloc => alloc,
        })
    }

    /// Hands out the completed ring.
    #[inline]
    pub(crate) fn finish(self) -> Ring<T, A, K> {
        self.ring
    }
}
