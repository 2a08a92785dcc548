//! Iterators and cursors over a [`Ring`].
//!
//! Iterators walk from both ends and stop when their remaining count hits
//! zero, so they never step onto the sentinel. Cursors instead treat the
//! sentinel as a real position: stepping past the last element lands on it,
//! stepping again wraps to the first element.

use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use crate::arena::{Links, Node};
use crate::{Allocator, Key, Ring};

// =============================================================================
// Shared traversal
// =============================================================================

/// Double-ended walk over the nodes of a ring snapshot.
struct RawIter<T, K> {
    base: NonNull<Node<T, K>>,
    front: K,
    back: K,
    len: usize,
}

impl<T, K: Key> RawIter<T, K> {
    #[inline]
    fn new(sentinel: Links<K>, len: usize, base: NonNull<Node<T, K>>) -> Self {
        Self {
            base,
            front: sentinel.next,
            back: sentinel.prev,
            len,
        }
    }

    #[inline]
    fn node(&self, key: K) -> *mut Node<T, K> {
        // Safety: only element keys of the ring are passed in, and `Key`
        // impls map them back to the index they were built from
        unsafe { self.base.as_ptr().add(key.as_usize() - 1) }
    }

    #[inline]
    fn next(&mut self) -> Option<*mut Node<T, K>> {
        if self.len == 0 {
            return None;
        }
        let node = self.node(self.front);
        // Safety: node is an element; read the link without borrowing the value
        self.front = unsafe { (*node).links.next };
        self.len -= 1;
        Some(node)
    }

    #[inline]
    fn next_back(&mut self) -> Option<*mut Node<T, K>> {
        if self.len == 0 {
            return None;
        }
        let node = self.node(self.back);
        // Safety: node is an element; read the link without borrowing the value
        self.back = unsafe { (*node).links.prev };
        self.len -= 1;
        Some(node)
    }
}

impl<T, K: Copy> Clone for RawIter<T, K> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            base: self.base,
            front: self.front,
            back: self.back,
            len: self.len,
        }
    }
}

// =============================================================================
// Iter
// =============================================================================

/// Iterator over references to ring elements.
pub struct Iter<'a, T, K: Key = u32> {
    raw: RawIter<T, K>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T, K: Key> Iter<'a, T, K> {
    #[inline]
    pub(crate) fn new(sentinel: Links<K>, len: usize, base: NonNull<Node<T, K>>) -> Self {
        Self {
            raw: RawIter::new(sentinel, len, base),
            _marker: PhantomData,
        }
    }
}

impl<'a, T: 'a, K: Key> Iterator for Iter<'a, T, K> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        // Safety: yielded nodes are elements, borrowed for 'a by the ring ref
        self.raw.next().map(|node| unsafe { (*node).value.assume_init_ref() })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.raw.len, Some(self.raw.len))
    }
}

impl<'a, T: 'a, K: Key> DoubleEndedIterator for Iter<'a, T, K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        // Safety: as in next
        self.raw.next_back().map(|node| unsafe { (*node).value.assume_init_ref() })
    }
}

impl<'a, T: 'a, K: Key> ExactSizeIterator for Iter<'a, T, K> {}
impl<'a, T: 'a, K: Key> FusedIterator for Iter<'a, T, K> {}

impl<T, K: Key> Clone for Iter<'_, T, K> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for Iter<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iter").field(&self.raw.len).finish()
    }
}

// Safety: behaves like &'a T
unsafe impl<T: Sync, K: Key + Sync> Send for Iter<'_, T, K> {}
unsafe impl<T: Sync, K: Key + Sync> Sync for Iter<'_, T, K> {}

// =============================================================================
// IterMut
// =============================================================================

/// Iterator over mutable references to ring elements.
pub struct IterMut<'a, T, K: Key = u32> {
    raw: RawIter<T, K>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T, K: Key> IterMut<'a, T, K> {
    #[inline]
    pub(crate) fn new(sentinel: Links<K>, len: usize, base: NonNull<Node<T, K>>) -> Self {
        Self {
            raw: RawIter::new(sentinel, len, base),
            _marker: PhantomData,
        }
    }
}

impl<'a, T: 'a, K: Key> Iterator for IterMut<'a, T, K> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        // Safety: each node is yielded once, the ring is mutably borrowed for 'a
        self.raw.next().map(|node| unsafe { (*node).value.assume_init_mut() })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.raw.len, Some(self.raw.len))
    }
}

impl<'a, T: 'a, K: Key> DoubleEndedIterator for IterMut<'a, T, K> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        // Safety: as in next
        self.raw.next_back().map(|node| unsafe { (*node).value.assume_init_mut() })
    }
}

impl<'a, T: 'a, K: Key> ExactSizeIterator for IterMut<'a, T, K> {}
impl<'a, T: 'a, K: Key> FusedIterator for IterMut<'a, T, K> {}

impl<T: fmt::Debug, K: Key> fmt::Debug for IterMut<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IterMut").field(&self.raw.len).finish()
    }
}

// Safety: behaves like &'a mut T
unsafe impl<T: Send, K: Key + Send> Send for IterMut<'_, T, K> {}
unsafe impl<T: Sync, K: Key + Sync> Sync for IterMut<'_, T, K> {}

// =============================================================================
// IntoIter
// =============================================================================

/// Owning iterator. Remaining elements are dropped with the iterator.
pub struct IntoIter<T, A: Allocator, K: Key> {
    ring: Ring<T, A, K>,
}

impl<T, A: Allocator, K: Key> IntoIter<T, A, K> {
    #[inline]
    pub(crate) fn new(ring: Ring<T, A, K>) -> Self {
        Self { ring }
    }
}

impl<T, A: Allocator, K: Key> Iterator for IntoIter<T, A, K> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.ring.pop_front()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ring.len(), Some(self.ring.len()))
    }
}

impl<T, A: Allocator, K: Key> DoubleEndedIterator for IntoIter<T, A, K> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.ring.pop_back()
    }
}

impl<T, A: Allocator, K: Key> ExactSizeIterator for IntoIter<T, A, K> {}
impl<T, A: Allocator, K: Key> FusedIterator for IntoIter<T, A, K> {}

impl<T: fmt::Debug, A: Allocator, K: Key> fmt::Debug for IntoIter<T, A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.ring).finish()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A read-only position on a ring, possibly the sentinel.
///
/// Two cursors are equal when they sit on the same node of the same ring.
/// Moving wraps: from the last element `move_next` lands on the sentinel,
/// and from the sentinel it lands on the first element.
///
/// # Example
///
/// ```
/// use nexus_ring::Ring;
///
/// let ring = Ring::from_elem(2, &1u32);
/// let mut cursor = ring.cursor_end();
/// assert!(cursor.is_sentinel());
///
/// cursor.move_prev();
/// assert_eq!(cursor, ring.cursor_back());
///
/// cursor.move_next();
/// assert_eq!(cursor, ring.cursor_end());
/// ```
pub struct Cursor<'a, T, A: Allocator, K: Key> {
    ring: &'a Ring<T, A, K>,
    key: K,
}

impl<'a, T, A: Allocator, K: Key> Cursor<'a, T, A, K> {
    #[inline]
    pub(crate) fn new(ring: &'a Ring<T, A, K>, key: K) -> Self {
        Self { ring, key }
    }

    /// Returns the element under the cursor, `None` on the sentinel.
    #[inline]
    pub fn current(&self) -> Option<&'a T> {
        if self.key.is_sentinel() {
            None
        } else {
            // Safety: cursor keys are always on the ring
            Some(unsafe { self.ring.value_at(self.key) })
        }
    }

    /// Returns `true` if the cursor sits on the sentinel.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.key.is_sentinel()
    }

    /// Steps to the next node.
    #[inline]
    pub fn move_next(&mut self) {
        // Safety: cursor keys are always on the ring
        self.key = unsafe { self.ring.next_key(self.key) };
    }

    /// Steps to the previous node.
    #[inline]
    pub fn move_prev(&mut self) {
        // Safety: cursor keys are always on the ring
        self.key = unsafe { self.ring.prev_key(self.key) };
    }

    /// Returns the element after the cursor without moving.
    #[inline]
    pub fn peek_next(&self) -> Option<&'a T> {
        let mut next = *self;
        next.move_next();
        next.current()
    }

    /// Returns the element before the cursor without moving.
    #[inline]
    pub fn peek_prev(&self) -> Option<&'a T> {
        let mut prev = *self;
        prev.move_prev();
        prev.current()
    }
}

impl<T, A: Allocator, K: Key> Clone for Cursor<'_, T, A, K> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: Allocator, K: Key> Copy for Cursor<'_, T, A, K> {}

impl<T, A: Allocator, K: Key> PartialEq for Cursor<'_, T, A, K> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.ring, other.ring) && self.key == other.key
    }
}

impl<T, A: Allocator, K: Key> Eq for Cursor<'_, T, A, K> {}

impl<T: fmt::Debug, A: Allocator, K: Key> fmt::Debug for Cursor<'_, T, A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.current()).finish()
    }
}

// =============================================================================
// CursorMut
// =============================================================================

/// A position on a ring that can edit the element under it.
///
/// Moves the same way as [`Cursor`].
///
/// # Example
///
/// ```
/// use nexus_ring::Ring;
///
/// let mut ring: Ring<u32> = Ring::from([1, 2, 3]);
/// let mut cursor = ring.cursor_back_mut();
/// while let Some(value) = cursor.current_mut() {
///     *value *= 10;
///     cursor.move_prev();
/// }
/// assert!(cursor.is_sentinel());
///
/// assert_eq!(ring, [10, 20, 30]);
/// ```
pub struct CursorMut<'a, T, A: Allocator, K: Key> {
    ring: &'a mut Ring<T, A, K>,
    key: K,
}

impl<'a, T, A: Allocator, K: Key> CursorMut<'a, T, A, K> {
    #[inline]
    pub(crate) fn new(ring: &'a mut Ring<T, A, K>, key: K) -> Self {
        Self { ring, key }
    }

    /// Returns the element under the cursor, `None` on the sentinel.
    #[inline]
    pub fn current(&self) -> Option<&T> {
        self.as_cursor().current()
    }

    /// Returns the element under the cursor mutably.
    #[inline]
    pub fn current_mut(&mut self) -> Option<&mut T> {
        if self.key.is_sentinel() {
            None
        } else {
            // Safety: cursor keys are always on the ring
            Some(unsafe { self.ring.value_at_mut(self.key) })
        }
    }

    /// Returns `true` if the cursor sits on the sentinel.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.key.is_sentinel()
    }

    /// Steps to the next node.
    #[inline]
    pub fn move_next(&mut self) {
        // Safety: cursor keys are always on the ring
        self.key = unsafe { self.ring.next_key(self.key) };
    }

    /// Steps to the previous node.
    #[inline]
    pub fn move_prev(&mut self) {
        // Safety: cursor keys are always on the ring
        self.key = unsafe { self.ring.prev_key(self.key) };
    }

    /// Returns the element after the cursor without moving.
    #[inline]
    pub fn peek_next(&self) -> Option<&T> {
        self.as_cursor().peek_next()
    }

    /// Returns the element before the cursor without moving.
    #[inline]
    pub fn peek_prev(&self) -> Option<&T> {
        self.as_cursor().peek_prev()
    }

    /// Returns a read-only cursor at the same position.
    #[inline]
    pub fn as_cursor(&self) -> Cursor<'_, T, A, K> {
        Cursor::new(&*self.ring, self.key)
    }
}

impl<T: fmt::Debug, A: Allocator, K: Key> fmt::Debug for CursorMut<'_, T, A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.current()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Ring;

    #[test]
    fn iter_both_ends_meet() {
        let ring: Ring<u32> = Ring::from([1, 2, 3, 4, 5]);
        let mut iter = ring.iter();

        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next_back(), Some(&5));
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next_back(), Some(&4));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.len(), 0);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn reversed_traversal() {
        let ring: Ring<u32> = Ring::from([1, 2, 3, 4]);
        let reversed: Vec<_> = ring.iter().rev().copied().collect();
        assert_eq!(reversed, vec![4, 3, 2, 1]);
    }

    #[test]
    fn empty_ring_yields_nothing() {
        let ring: Ring<u32> = Ring::new();
        assert_eq!(ring.iter().next(), None);
        assert_eq!(ring.iter().next_back(), None);
        assert!(ring.cursor_front().is_sentinel());
        assert_eq!(ring.cursor_front(), ring.cursor_end());
    }

    #[test]
    fn iter_mut_updates_in_place() {
        let mut ring: Ring<u32> = Ring::from([1, 2, 3]);
        for value in ring.iter_mut() {
            *value *= 10;
        }
        for value in &mut ring {
            *value += 1;
        }
        assert_eq!(ring, [11, 21, 31]);
    }

    #[test]
    fn into_iter_from_both_ends() {
        let ring: Ring<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut iter = ring.into_iter();

        assert_eq!(iter.next_back().as_deref(), Some("c"));
        assert_eq!(iter.next().as_deref(), Some("a"));
        assert_eq!(iter.len(), 1);
    }

    #[test]
    fn cursor_wraps_through_sentinel() {
        let ring: Ring<u32> = Ring::from([1, 2, 3]);
        let mut cursor = ring.cursor_front();

        assert_eq!(cursor.current(), Some(&1));
        cursor.move_next();
        cursor.move_next();
        assert_eq!(cursor.current(), Some(&3));
        cursor.move_next();
        assert!(cursor.is_sentinel());
        assert_eq!(cursor.current(), None);
        cursor.move_next();
        assert_eq!(cursor.current(), Some(&1));

        cursor.move_prev();
        cursor.move_prev();
        assert_eq!(cursor.current(), Some(&3));
    }

    #[test]
    fn cursor_peek() {
        let ring: Ring<u32> = Ring::from([1, 2]);
        let cursor = ring.cursor_front();
        assert_eq!(cursor.peek_prev(), None);
        assert_eq!(cursor.peek_next(), Some(&2));
        assert_eq!(ring.cursor_end().peek_next(), Some(&1));
        assert_eq!(ring.cursor_end().peek_prev(), Some(&2));
    }

    #[test]
    fn cursor_equality_is_identity() {
        let a: Ring<u32> = Ring::from([1]);
        let b: Ring<u32> = Ring::from([1]);

        assert_eq!(a.cursor_front(), a.cursor_back());
        assert_ne!(a.cursor_front(), a.cursor_end());
        assert_ne!(a.cursor_front(), b.cursor_front());
    }

    #[test]
    fn cursor_mut_edits_in_place() {
        let mut ring: Ring<u32> = Ring::from([1, 2, 3, 4]);
        let mut cursor = ring.cursor_front_mut();

        cursor.move_next();
        *cursor.current_mut().unwrap() = 20;
        assert_eq!(cursor.peek_prev(), Some(&1));
        assert_eq!(cursor.peek_next(), Some(&3));
        assert_eq!(cursor.as_cursor().current(), Some(&20));

        let mut end = ring.cursor_end_mut();
        assert!(end.current_mut().is_none());
        end.move_prev();
        *end.current_mut().unwrap() = 40;

        assert_eq!(ring, [1, 20, 3, 40]);
        ring.assert_invariants();
    }

    #[test]
    fn cursor_mut_full_lap() {
        let mut ring: Ring<u32> = Ring::from([1, 2, 3]);
        let mut cursor = ring.cursor_end_mut();
        let mut seen = Vec::new();
        for _ in 0..8 {
            cursor.move_next();
            seen.push(cursor.current().copied());
        }
        assert_eq!(seen, vec![Some(1), Some(2), Some(3), None, Some(1), Some(2), Some(3), None]);
    }
}
