//! Allocator-aware circular doubly-linked list.
//!
//! A [`Ring`] is a sentinel ring: an anchor node stored inside the ring
//! closes the chain, so the first element is `sentinel.next`, the last is
//! `sentinel.prev`, and an empty ring is a sentinel pointing at itself.
//! Element nodes live in a per-ring arena obtained from the ring's
//! [`Allocator`] and are addressed by [`Key`] rather than by pointer.
//!
//! # Failure Atomicity
//!
//! Every operation that creates nodes is all-or-nothing:
//!
//! - a push that cannot allocate (`try_push_*`) or whose value cannot be
//!   produced (`try_push_*_with`) leaves the ring untouched
//! - bulk construction (`try_from_fn_in`, `try_clone`, ...) that fails at the
//!   k-th element releases the k-1 nodes already built and their storage
//!   before the error reaches the caller
//! - copy assignment builds the new ring on the side and only replaces the
//!   old contents once every element copied
//!
//! Panics raised by `Clone`, `Default` or a producer closure unwind through
//! the same paths, so nothing leaks either way.
//!
//! # Example
//!
//! ```
//! use nexus_ring::Ring;
//!
//! let mut ring = Ring::from_elem(3, &7);
//! assert_eq!(ring, [7, 7, 7]);
//!
//! ring.push_front(5);
//! assert_eq!(ring, [5, 7, 7, 7]);
//!
//! assert_eq!(ring.pop_back(), Some(7));
//! assert_eq!(ring.front(), Some(&5));
//! assert_eq!(ring.back(), Some(&7));
//! assert_eq!(ring.len(), 3);
//! ```
//!
//! # Custom Allocators
//!
//! ```
//! use nexus_ring::{Global, Ring};
//!
//! let mut ring: Ring<u64, Global, u16> = Ring::new_in(Global);
//! ring.try_push_back(1).unwrap();
//! ring.try_push_back(2).unwrap();
//!
//! let copy = ring.try_clone().unwrap();
//! assert_eq!(copy, [1, 2]);
//! ```

use core::cmp::Ordering;
use core::convert::Infallible;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem;
use core::ptr;

use crate::arena::{Links, NodeArena};
use crate::builder::RingBuilder;
use crate::iter::{Cursor, CursorMut, IntoIter, Iter, IterMut};
use crate::{AllocError, Allocator, BuildError, Global, Key, TryClone, TryPushError};

/// A doubly-linked list whose nodes come from a custom allocator.
///
/// # Type Parameters
///
/// - `T`: Element type
/// - `A`: Allocator for node storage (default [`Global`])
/// - `K`: Node key type (default `u32`), bounds the node count
pub struct Ring<T, A: Allocator = Global, K: Key = u32> {
    sentinel: Links<K>,
    len: usize,
    arena: NodeArena<T, K, A>,
}

// =============================================================================
// Global allocator constructors
// =============================================================================

impl<T> Ring<T> {
    /// Creates an empty ring. Does not allocate.
    #[inline]
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates an empty ring with room for at least `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }

    /// Creates a ring of `count` copies of `value`.
    pub fn from_elem(count: usize, value: &T) -> Self
    where
        T: Clone,
    {
        Self::from_elem_in(count, value, Global)
    }

    /// Creates a ring of `count` default values.
    pub fn with_len(count: usize) -> Self
    where
        T: Default,
    {
        Self::with_len_in(count, Global)
    }
}

// =============================================================================
// Construction
// =============================================================================

impl<T, A: Allocator, K: Key> Ring<T, A, K> {
    /// Creates an empty ring using `alloc`. Does not allocate.
    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        Self {
            sentinel: Links::self_loop(),
            len: 0,
            arena: NodeArena::new_in(alloc),
        }
    }

    /// Creates an empty ring with room for at least `capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure if the storage cannot be obtained.
    pub fn try_with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        let mut ring = Self::new_in(alloc);
        ring.try_reserve(capacity)?;
        Ok(ring)
    }

    /// Creates an empty ring with room for at least `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics with `"capacity overflow"` if `capacity` exceeds
    /// [`Key::MAX_NODES`]; diverges through
    /// [`std::alloc::handle_alloc_error`] if the allocator fails.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self::try_with_capacity_in(capacity, alloc).unwrap_or_else(|err| err.handle())
    }

    /// Builds a ring of `count` elements produced by `produce(index)`.
    ///
    /// Storage for all `count` nodes is reserved up front. If `produce`
    /// fails (or panics) at index `k`, the `k` elements already built are
    /// dropped and every allocation is returned before the error surfaces.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_ring::{BuildError, Global, Ring};
    ///
    /// let squares: Ring<u64> =
    ///     Ring::try_from_fn_in(4, Global, |i| Ok::<_, ()>((i * i) as u64)).unwrap();
    /// assert_eq!(squares, [0, 1, 4, 9]);
    ///
    /// let err = Ring::<u64>::try_from_fn_in(4, Global, |i| if i < 2 { Ok(1) } else { Err("bad") })
    ///     .unwrap_err();
    /// assert_eq!(err, BuildError::Element { index: 2, error: "bad" });
    /// ```
    pub fn try_from_fn_in<E, F>(
        count: usize,
        alloc: A,
        mut produce: F,
    ) -> Result<Self, BuildError<E>>
    where
        F: FnMut(usize) -> Result<T, E>,
    {
        let mut builder = RingBuilder::with_capacity_in(count, alloc)?;
        for index in 0..count {
            builder.push_with(|| produce(index))?;
        }
        Ok(builder.finish())
    }

    /// Builds a ring from a sequence of fallible elements.
    ///
    /// Stops at the first `Err`, releasing everything built so far.
    pub fn try_from_iter_in<I, E>(iter: I, alloc: A) -> Result<Self, BuildError<E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
    {
        let iter = iter.into_iter();
        let mut builder = RingBuilder::with_capacity_in(iter.size_hint().0, alloc)?;
        for item in iter {
            builder.push_with(|| item)?;
        }
        Ok(builder.finish())
    }

    /// Creates a ring of `count` copies of `value`.
    pub fn from_elem_in(count: usize, value: &T, alloc: A) -> Self
    where
        T: Clone,
    {
        unwrap_infallible(Self::try_from_fn_in(count, alloc, |_| Ok(value.clone())))
    }

    /// Creates a ring of `count` copies of `value`, reporting copy failures.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure or the first failed copy.
    pub fn try_from_elem_in(count: usize, value: &T, alloc: A) -> Result<Self, BuildError<T::Error>>
    where
        T: TryClone,
    {
        Self::try_from_fn_in(count, alloc, |_| value.try_clone())
    }

    /// Creates a ring of `count` default values.
    pub fn with_len_in(count: usize, alloc: A) -> Self
    where
        T: Default,
    {
        unwrap_infallible(Self::try_from_fn_in(count, alloc, |_| Ok(T::default())))
    }

    /// Creates a ring of `count` default values.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure if the storage cannot be obtained.
    pub fn try_with_len_in(count: usize, alloc: A) -> Result<Self, AllocError>
    where
        T: Default,
    {
        Self::try_from_fn_in(count, alloc, |_| Ok::<_, Infallible>(T::default())).map_err(|err| {
            match err {
                BuildError::Alloc(err) => err,
                BuildError::Element { error, .. } => match error {},
            }
        })
    }

    /// Creates a ring from a fixed list of values, in order.
    pub fn from_array_in<const N: usize>(values: [T; N], alloc: A) -> Self {
        unwrap_infallible(Self::try_from_iter_in(values.into_iter().map(Ok), alloc))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the ring holds no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements the ring can hold without allocating.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Returns the node allocator.
    #[inline]
    pub const fn allocator(&self) -> &A {
        self.arena.allocator()
    }

    /// Returns a reference to the first element.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            // Safety: non-empty, so sentinel.next is an element
            Some(unsafe { self.arena.value(self.sentinel.next) })
        }
    }

    /// Returns a mutable reference to the first element.
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            None
        } else {
            // Safety: non-empty, so sentinel.next is an element
            Some(unsafe { self.arena.value_mut(self.sentinel.next) })
        }
    }

    /// Returns a reference to the last element.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            // Safety: non-empty, so sentinel.prev is an element
            Some(unsafe { self.arena.value(self.sentinel.prev) })
        }
    }

    /// Returns a mutable reference to the last element.
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            None
        } else {
            // Safety: non-empty, so sentinel.prev is an element
            Some(unsafe { self.arena.value_mut(self.sentinel.prev) })
        }
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Appends an element.
    ///
    /// # Panics
    ///
    /// Panics with `"capacity overflow"` if the key type `K` has no room for
    /// another node ([`Key::MAX_NODES`]); diverges through
    /// [`std::alloc::handle_alloc_error`] if the allocator fails.
    /// Use [`try_push_back`](Self::try_push_back) to handle either case.
    #[inline]
    pub fn push_back(&mut self, value: T) {
        if let Err(err) = self.try_push_back(value) {
            err.alloc_error().handle();
        }
    }

    /// Prepends an element.
    ///
    /// # Panics
    ///
    /// Panics with `"capacity overflow"` if the key type `K` has no room for
    /// another node ([`Key::MAX_NODES`]); diverges through
    /// [`std::alloc::handle_alloc_error`] if the allocator fails.
    #[inline]
    pub fn push_front(&mut self, value: T) {
        if let Err(err) = self.try_push_front(value) {
            err.alloc_error().handle();
        }
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns the value back if the node cannot be allocated; the ring is
    /// unchanged.
    #[inline]
    pub fn try_push_back(&mut self, value: T) -> Result<(), TryPushError<T>> {
        self.insert_before(K::SENTINEL, value)
    }

    /// Prepends an element.
    ///
    /// # Errors
    ///
    /// Returns the value back if the node cannot be allocated; the ring is
    /// unchanged.
    #[inline]
    pub fn try_push_front(&mut self, value: T) -> Result<(), TryPushError<T>> {
        self.insert_before(self.sentinel.next, value)
    }

    /// Allocates a node at the back, then fills it with `produce()`.
    ///
    /// The closure only runs once the node is allocated. If it fails or
    /// panics, the node is released and the ring is unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_ring::{BuildError, Ring};
    ///
    /// let mut ring: Ring<u32> = Ring::new();
    /// ring.try_push_back_with(|| "42".parse::<u32>()).unwrap();
    ///
    /// let err = ring.try_push_back_with(|| "x".parse::<u32>()).unwrap_err();
    /// assert!(matches!(err, BuildError::Element { index: 0, .. }));
    /// assert_eq!(ring, [42]);
    /// ```
    pub fn try_push_back_with<E, F>(&mut self, produce: F) -> Result<(), BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let key = self.construct(produce)?;
        // Safety: key holds a value; sentinel is always on the ring
        unsafe { self.link_before(key, K::SENTINEL) };
        Ok(())
    }

    /// Allocates a node at the front, then fills it with `produce()`.
    ///
    /// See [`try_push_back_with`](Self::try_push_back_with).
    pub fn try_push_front_with<E, F>(&mut self, produce: F) -> Result<(), BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let key = self.construct(produce)?;
        let head = self.sentinel.next;
        // Safety: key holds a value; head is on the ring
        unsafe { self.link_before(key, head) };
        Ok(())
    }

    /// Appends a copy of `value`.
    ///
    /// The node is allocated before `value` is cloned; a panicking clone
    /// leaves the ring unchanged.
    pub fn push_back_cloned(&mut self, value: &T)
    where
        T: Clone,
    {
        unwrap_infallible(self.try_push_back_with(|| Ok(value.clone())));
    }

    /// Prepends a copy of `value`.
    pub fn push_front_cloned(&mut self, value: &T)
    where
        T: Clone,
    {
        unwrap_infallible(self.try_push_front_with(|| Ok(value.clone())));
    }

    /// Appends a copy of `value`, reporting copy failures.
    pub fn try_push_back_cloned(&mut self, value: &T) -> Result<(), BuildError<T::Error>>
    where
        T: TryClone,
    {
        self.try_push_back_with(|| value.try_clone())
    }

    /// Prepends a copy of `value`, reporting copy failures.
    pub fn try_push_front_cloned(&mut self, value: &T) -> Result<(), BuildError<T::Error>>
    where
        T: TryClone,
    {
        self.try_push_front_with(|| value.try_clone())
    }

    // ========================================================================
    // Pop
    // ========================================================================

    /// Removes and returns the last element, or `None` if empty.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // Safety: non-empty
        Some(unsafe { self.pop_back_unchecked() })
    }

    /// Removes and returns the first element, or `None` if empty.
    #[inline]
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // Safety: non-empty
        Some(unsafe { self.pop_front_unchecked() })
    }

    /// Removes and returns the last element without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The ring must not be empty.
    #[inline]
    pub unsafe fn pop_back_unchecked(&mut self) -> T {
        debug_assert!(!self.is_empty());
        // Safety: caller guarantees sentinel.prev is an element
        unsafe { self.remove(self.sentinel.prev) }
    }

    /// Removes and returns the first element without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The ring must not be empty.
    #[inline]
    pub unsafe fn pop_front_unchecked(&mut self) -> T {
        debug_assert!(!self.is_empty());
        // Safety: caller guarantees sentinel.next is an element
        unsafe { self.remove(self.sentinel.next) }
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Drops every element. Keeps the allocated storage.
    pub fn clear(&mut self) {
        struct DropGuard<'a, T, A: Allocator, K: Key>(&'a mut Ring<T, A, K>);

        impl<T, A: Allocator, K: Key> Drop for DropGuard<'_, T, A, K> {
            fn drop(&mut self) {
                // Keep dropping if an element's destructor panicked
                while self.0.pop_front().is_some() {}
            }
        }

        while let Some(value) = self.pop_front() {
            let guard = DropGuard(self);
            drop(value);
            mem::forget(guard);
        }
        self.arena.reset();
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure; the ring is unchanged.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        self.arena.try_reserve(additional)
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics with `"capacity overflow"` if `len + additional` exceeds
    /// [`Key::MAX_NODES`]; diverges through
    /// [`std::alloc::handle_alloc_error`] if the allocator fails.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            err.handle();
        }
    }

    /// Shrinks the storage as close to `len` as possible.
    ///
    /// Nodes are compacted into a fresh allocation in ring order. If that
    /// allocation fails the ring keeps its current storage.
    pub fn shrink_to_fit(&mut self) {
        if self.is_empty() {
            self.arena.release_buffer();
            return;
        }
        if self.capacity() <= self.len {
            return;
        }

        let Ok(mut compact) = Self::try_with_capacity_in(self.len, self.allocator().clone()) else {
            return;
        };
        if compact.capacity() >= self.capacity() {
            return;
        }
        while let Some(value) = self.pop_front() {
            // Capacity was reserved above, so this cannot fail
            if let Err(err) = compact.try_push_back(value) {
                err.alloc_error().handle();
            }
        }
        *self = compact;
    }

    // ========================================================================
    // Copy / move / assignment
    // ========================================================================

    /// Copies the ring into storage from `alloc`, reporting copy failures.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure or the first failed element copy.
    /// Nothing built before the failure survives.
    pub fn try_clone_in(&self, alloc: A) -> Result<Self, BuildError<T::Error>>
    where
        T: TryClone,
    {
        self.copy_in(alloc, T::try_clone)
    }

    /// Copies the ring with the allocator chosen by
    /// [`Allocator::select_on_copy`].
    pub fn try_clone(&self) -> Result<Self, BuildError<T::Error>>
    where
        T: TryClone,
    {
        self.try_clone_in(self.allocator().select_on_copy())
    }

    /// Replaces the contents with copies of `source`'s elements.
    ///
    /// Strong guarantee: the copy is built before anything is released. If
    /// an element copy panics, `self` is unchanged. Takes `source`'s
    /// allocator when [`Allocator::propagates_on_copy_assignment`] says so.
    pub fn clone_assign(&mut self, source: &Self)
    where
        T: Clone,
    {
        unwrap_infallible(self.assign_with(source, |value| Ok(value.clone())));
    }

    /// Replaces the contents with copies of `source`'s elements.
    ///
    /// # Errors
    ///
    /// Returns the allocation failure or the first failed copy. `self` is
    /// left exactly as it was.
    pub fn try_clone_assign(&mut self, source: &Self) -> Result<(), BuildError<T::Error>>
    where
        T: TryClone,
    {
        self.assign_with(source, T::try_clone)
    }

    /// Moves the contents out, leaving an empty ring behind.
    ///
    /// O(1): the node storage changes hands, no node is touched.
    #[inline]
    pub fn take(&mut self) -> Self {
        let empty = Self::new_in(self.allocator().clone());
        mem::replace(self, empty)
    }

    /// Drops the current contents and adopts `source`'s, leaving `source`
    /// empty.
    ///
    /// Node storage always travels with an allocator able to free it: the
    /// target keeps its own allocator instance only when it does not
    /// propagate on move and compares equal to the source's.
    pub fn move_assign(&mut self, source: &mut Self) {
        if ptr::eq(&*self, &*source) {
            return;
        }

        let incoming = source.take();
        let keep_own = !self.allocator().propagates_on_move_assignment()
            && self.allocator().is_equal(incoming.allocator());

        if keep_own {
            let alloc = self.allocator().clone();
            *self = incoming;
            self.arena.replace_allocator(alloc);
        } else {
            *self = incoming;
        }
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Returns a front-to-back iterator. Use `.rev()` for back-to-front.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, K> {
        Iter::new(self.sentinel, self.len, self.arena.base())
    }

    /// Returns a front-to-back iterator over mutable references.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T, K> {
        IterMut::new(self.sentinel, self.len, self.arena.base())
    }

    /// Returns a cursor on the first element (the sentinel if empty).
    #[inline]
    pub fn cursor_front(&self) -> Cursor<'_, T, A, K> {
        Cursor::new(self, self.sentinel.next)
    }

    /// Returns a cursor on the last element (the sentinel if empty).
    #[inline]
    pub fn cursor_back(&self) -> Cursor<'_, T, A, K> {
        Cursor::new(self, self.sentinel.prev)
    }

    /// Returns a cursor on the sentinel: one past the last element and one
    /// before the first.
    #[inline]
    pub fn cursor_end(&self) -> Cursor<'_, T, A, K> {
        Cursor::new(self, K::SENTINEL)
    }

    /// Returns a mutable cursor on the first element.
    #[inline]
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T, A, K> {
        let key = self.sentinel.next;
        CursorMut::new(self, key)
    }

    /// Returns a mutable cursor on the last element.
    #[inline]
    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, T, A, K> {
        let key = self.sentinel.prev;
        CursorMut::new(self, key)
    }

    /// Returns a mutable cursor on the sentinel.
    #[inline]
    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, T, A, K> {
        CursorMut::new(self, K::SENTINEL)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Walks the ring and panics if any link or count invariant is broken.
    ///
    /// O(n). Intended for tests and debugging.
    pub fn assert_invariants(&self) {
        let mut key = K::SENTINEL;
        let mut count = 0usize;
        loop {
            // Safety: every key reached from the sentinel is on the ring
            let links = unsafe { *self.links(key) };
            let next_prev = unsafe { self.links(links.next) }.prev;
            let prev_next = unsafe { self.links(links.prev) }.next;
            assert_eq!(next_prev, key, "next.prev mismatch at {:?}", key);
            assert_eq!(prev_next, key, "prev.next mismatch at {:?}", key);

            key = links.next;
            if key.is_sentinel() {
                break;
            }
            assert!(count < self.len, "ring longer than len {}", self.len);
            count += 1;
        }
        assert_eq!(count, self.len, "len does not match ring");
        assert_eq!(self.arena.occupied(), self.len, "arena holds unlinked slots");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Returns the key after `key`.
    ///
    /// # Safety
    ///
    /// `key` must be the sentinel or an element of this ring.
    #[inline]
    pub(crate) unsafe fn next_key(&self, key: K) -> K {
        unsafe { self.links(key) }.next
    }

    /// Returns the key before `key`.
    ///
    /// # Safety
    ///
    /// `key` must be the sentinel or an element of this ring.
    #[inline]
    pub(crate) unsafe fn prev_key(&self, key: K) -> K {
        unsafe { self.links(key) }.prev
    }

    /// # Safety
    ///
    /// `key` must be an element of this ring.
    #[inline]
    pub(crate) unsafe fn value_at(&self, key: K) -> &T {
        unsafe { self.arena.value(key) }
    }

    /// # Safety
    ///
    /// `key` must be an element of this ring.
    #[inline]
    pub(crate) unsafe fn value_at_mut(&mut self, key: K) -> &mut T {
        unsafe { self.arena.value_mut(key) }
    }

    /// Allocates a node for `value` and splices it in before `at`.
    ///
    /// `at` must be the sentinel or an element of this ring.
    #[inline]
    fn insert_before(&mut self, at: K, value: T) -> Result<(), TryPushError<T>> {
        let key = match self.arena.reserve_slot() {
            Ok(key) => key,
            Err(err) => return Err(TryPushError::new(value, err)),
        };
        // Safety: key was just reserved; at is on the ring
        unsafe {
            self.arena.write(key, value);
            self.link_before(key, at);
        }
        Ok(())
    }

    /// Unlinks an element and moves its value out.
    ///
    /// # Safety
    ///
    /// `key` must be an element of this ring.
    #[inline]
    unsafe fn remove(&mut self, key: K) -> T {
        unsafe {
            self.unlink(key);
            self.arena.take(key)
        }
    }

    #[inline]
    unsafe fn links(&self, key: K) -> &Links<K> {
        if key.is_sentinel() {
            &self.sentinel
        } else {
            unsafe { self.arena.links(key) }
        }
    }

    #[inline]
    unsafe fn links_mut(&mut self, key: K) -> &mut Links<K> {
        if key.is_sentinel() {
            &mut self.sentinel
        } else {
            unsafe { self.arena.links_mut(key) }
        }
    }

    /// Splices a filled, unlinked node in before `at`.
    ///
    /// # Safety
    ///
    /// `key` must hold a value and be off the ring; `at` must be on it.
    #[inline]
    unsafe fn link_before(&mut self, key: K, at: K) {
        let prev = unsafe { self.links(at) }.prev;
        unsafe {
            *self.arena.links_mut(key) = Links { prev, next: at };
            self.links_mut(prev).next = key;
            self.links_mut(at).prev = key;
        }
        self.len += 1;
    }

    /// Splices a node out of the ring. Its slot stays reserved.
    ///
    /// # Safety
    ///
    /// `key` must be an element of this ring.
    #[inline]
    unsafe fn unlink(&mut self, key: K) {
        let Links { prev, next } = unsafe { *self.arena.links(key) };
        unsafe {
            self.links_mut(prev).next = next;
            self.links_mut(next).prev = prev;
        }
        self.len -= 1;
    }

    /// Reserves a slot, then fills it with `produce()`.
    ///
    /// The slot is released again if `produce` fails or unwinds.
    fn construct<E, F>(&mut self, produce: F) -> Result<K, BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        struct SlotGuard<'a, T, K: Key, A: Allocator> {
            arena: &'a mut NodeArena<T, K, A>,
            key: K,
        }

        impl<T, K: Key, A: Allocator> Drop for SlotGuard<'_, T, K, A> {
            fn drop(&mut self) {
                // Safety: slot was reserved and never filled or linked
                unsafe { self.arena.release(self.key) };
            }
        }

        let key = self.arena.reserve_slot()?;
        let guard = SlotGuard {
            arena: &mut self.arena,
            key,
        };

        match produce() {
            Ok(value) => {
                mem::forget(guard);
                // Safety: slot is reserved and empty
                unsafe { self.arena.write(key, value) };
                Ok(key)
            }
            Err(error) => {
                drop(guard);
                Err(BuildError::Element { index: 0, error })
            }
        }
    }

    fn copy_in<E, F>(&self, alloc: A, mut copy: F) -> Result<Self, BuildError<E>>
    where
        F: FnMut(&T) -> Result<T, E>,
    {
        let mut builder = RingBuilder::with_capacity_in(self.len, alloc)?;
        for value in self.iter() {
            builder.push_with(|| copy(value))?;
        }
        Ok(builder.finish())
    }

    fn assign_with<E, F>(&mut self, source: &Self, copy: F) -> Result<(), BuildError<E>>
    where
        F: FnMut(&T) -> Result<T, E>,
    {
        if ptr::eq(&*self, source) {
            return Ok(());
        }

        let alloc = if self.allocator().propagates_on_copy_assignment() {
            source.allocator().clone()
        } else {
            self.allocator().clone()
        };
        let fresh = source.copy_in(alloc, copy)?;
        *self = fresh;
        Ok(())
    }
}

/// Unwraps a result whose only possible error is an allocation failure.
#[inline]
fn unwrap_infallible<R>(result: Result<R, BuildError<Infallible>>) -> R {
    match result {
        Ok(value) => value,
        Err(BuildError::Alloc(err)) => err.handle(),
        Err(BuildError::Element { error, .. }) => match error {},
    }
}

impl<T, A: Allocator, K: Key> Drop for Ring<T, A, K> {
    fn drop(&mut self) {
        self.clear();
    }
}

// =============================================================================
// Trait impls
// =============================================================================

impl<T, A: Allocator + Default, K: Key> Default for Ring<T, A, K> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: Clone, A: Allocator, K: Key> Clone for Ring<T, A, K> {
    fn clone(&self) -> Self {
        let alloc = self.allocator().select_on_copy();
        unwrap_infallible(self.copy_in(alloc, |value| Ok(value.clone())))
    }

    fn clone_from(&mut self, source: &Self) {
        self.clone_assign(source);
    }
}

impl<T: TryClone, A: Allocator, K: Key> TryClone for Ring<T, A, K> {
    type Error = BuildError<T::Error>;

    fn try_clone(&self) -> Result<Self, Self::Error> {
        Ring::try_clone(self)
    }
}

impl<T: fmt::Debug, A: Allocator, K: Key> fmt::Debug for Ring<T, A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, A: Allocator, K: Key> PartialEq for Ring<T, A, K> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, A: Allocator, K: Key> Eq for Ring<T, A, K> {}

impl<T: PartialEq, A: Allocator, K: Key> PartialEq<[T]> for Ring<T, A, K> {
    fn eq(&self, other: &[T]) -> bool {
        self.len == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: PartialEq, A: Allocator, K: Key> PartialEq<&[T]> for Ring<T, A, K> {
    fn eq(&self, other: &&[T]) -> bool {
        *self == **other
    }
}

impl<T: PartialEq, A: Allocator, K: Key, const N: usize> PartialEq<[T; N]> for Ring<T, A, K> {
    fn eq(&self, other: &[T; N]) -> bool {
        *self == other[..]
    }
}

impl<T: PartialEq, A: Allocator, K: Key> PartialEq<Vec<T>> for Ring<T, A, K> {
    fn eq(&self, other: &Vec<T>) -> bool {
        *self == other[..]
    }
}

impl<T: PartialOrd, A: Allocator, K: Key> PartialOrd for Ring<T, A, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, A: Allocator, K: Key> Ord for Ring<T, A, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, A: Allocator, K: Key> Hash for Ring<T, A, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);
        for value in self {
            value.hash(state);
        }
    }
}

impl<T, A: Allocator, K: Key> Extend<T> for Ring<T, A, K> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<'a, T: Copy + 'a, A: Allocator, K: Key> Extend<&'a T> for Ring<T, A, K> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        <Self as Extend<T>>::extend(self, iter.into_iter().copied());
    }
}

impl<T, A: Allocator + Default, K: Key> FromIterator<T> for Ring<T, A, K> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        unwrap_infallible(Self::try_from_iter_in(iter.into_iter().map(Ok), A::default()))
    }
}

impl<T, A: Allocator + Default, K: Key, const N: usize> From<[T; N]> for Ring<T, A, K> {
    fn from(values: [T; N]) -> Self {
        Self::from_array_in(values, A::default())
    }
}

impl<T, A: Allocator, K: Key> IntoIterator for Ring<T, A, K> {
    type Item = T;
    type IntoIter = IntoIter<T, A, K>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}

impl<'a, T, A: Allocator, K: Key> IntoIterator for &'a Ring<T, A, K> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, K>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator, K: Key> IntoIterator for &'a mut Ring<T, A, K> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, K>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
