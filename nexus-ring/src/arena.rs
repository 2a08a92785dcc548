//! Node storage for a single ring.
//!
//! The arena is one allocation holding an array of [`Node`]s, obtained from
//! the ring's [`Allocator`] with the node layout. Element key `k` lives in
//! slot `k - 1`; key `0` is the ring's sentinel and never touches the arena.
//!
//! Slots are handed out from a LIFO free list first and from the untouched
//! tail of the buffer second. Growth reallocates and moves every slot, which
//! is fine because links are keys, not addresses.
//!
//! The arena does not track which slots hold values. Dropping values is the
//! ring's job (it walks its links); dropping the arena only frees the buffer.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::{AllocError, Allocator, Key};

/// Smallest non-zero slot count allocated.
const MIN_CAPACITY: usize = 4;

/// Navigational links shared by the sentinel and element nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links<K> {
    pub(crate) prev: K,
    pub(crate) next: K,
}

impl<K: Key> Links<K> {
    /// Links of an empty ring's sentinel: both ends point back at it.
    #[inline]
    pub(crate) const fn self_loop() -> Self {
        Self {
            prev: K::SENTINEL,
            next: K::SENTINEL,
        }
    }
}

/// An arena slot: links plus a value that is initialized only while the
/// slot is occupied.
pub(crate) struct Node<T, K> {
    pub(crate) links: Links<K>,
    pub(crate) value: MaybeUninit<T>,
}

pub(crate) struct NodeArena<T, K: Key, A: Allocator> {
    /// Buffer of `capacity` nodes. Dangling while `capacity == 0`.
    ptr: NonNull<Node<T, K>>,
    capacity: usize,
    /// Slots `0..high` have been handed out at least once.
    high: usize,
    /// Head of the vacant-slot list (element key), `K::NONE` when empty.
    free: K,
    /// Number of reserved slots.
    occupied: usize,
    alloc: A,
    _marker: PhantomData<T>,
}

impl<T, K: Key, A: Allocator> NodeArena<T, K, A> {
    /// Creates an arena without allocating.
    #[inline]
    pub(crate) const fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
            high: 0,
            free: K::NONE,
            occupied: 0,
            alloc,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) const fn occupied(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub(crate) const fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Swaps in an allocator instance able to free the current buffer.
    ///
    /// Callers guarantee `alloc.is_equal(&self.alloc)`.
    #[inline]
    pub(crate) fn replace_allocator(&mut self, alloc: A) {
        debug_assert!(alloc.is_equal(&self.alloc));
        self.alloc = alloc;
    }

    #[inline]
    pub(crate) fn base(&self) -> NonNull<Node<T, K>> {
        self.ptr
    }

    // ========================================================================
    // Slot access
    // ========================================================================

    #[inline]
    fn slot(&self, key: K) -> *mut Node<T, K> {
        debug_assert!(!key.is_sentinel() && key.is_some());
        debug_assert!(key.as_usize() <= self.high);
        // Safety: element keys address slots below `high <= capacity`; the
        // `Key` contract keeps `as_usize` equal to the index we handed out
        unsafe { self.ptr.as_ptr().add(key.as_usize() - 1) }
    }

    /// # Safety
    ///
    /// `key` must be a reserved element key.
    #[inline]
    pub(crate) unsafe fn links(&self, key: K) -> &Links<K> {
        unsafe { &(*self.slot(key)).links }
    }

    /// # Safety
    ///
    /// `key` must be a reserved element key.
    #[inline]
    pub(crate) unsafe fn links_mut(&mut self, key: K) -> &mut Links<K> {
        unsafe { &mut (*self.slot(key)).links }
    }

    /// # Safety
    ///
    /// `key` must be a reserved element key whose value has been written.
    #[inline]
    pub(crate) unsafe fn value(&self, key: K) -> &T {
        unsafe { (*self.slot(key)).value.assume_init_ref() }
    }

    /// # Safety
    ///
    /// `key` must be a reserved element key whose value has been written.
    #[inline]
    pub(crate) unsafe fn value_mut(&mut self, key: K) -> &mut T {
        unsafe { (*self.slot(key)).value.assume_init_mut() }
    }

    /// Writes the value of a freshly reserved slot.
    ///
    /// # Safety
    ///
    /// `key` must be reserved and hold no value.
    #[inline]
    pub(crate) unsafe fn write(&mut self, key: K, value: T) {
        unsafe { (*self.slot(key)).value.write(value) };
    }

    /// Moves the value out and returns the slot to the free list.
    ///
    /// # Safety
    ///
    /// `key` must be reserved, hold a value, and be unlinked from the ring.
    #[inline]
    pub(crate) unsafe fn take(&mut self, key: K) -> T {
        let value = unsafe { (*self.slot(key)).value.assume_init_read() };
        unsafe { self.release(key) };
        value
    }

    // ========================================================================
    // Reserve / release
    // ========================================================================

    /// Reserves a slot for one node, growing the buffer if needed.
    ///
    /// The slot's links and value are uninitialized from the ring's point
    /// of view. On error nothing changes.
    #[inline]
    pub(crate) fn reserve_slot(&mut self) -> Result<K, AllocError> {
        if self.free.is_some() {
            let key = self.free;
            // Safety: free-list keys are slots below `high`
            self.free = unsafe { self.links(key) }.next;
            self.occupied += 1;
            return Ok(key);
        }

        if self.high == self.capacity {
            self.grow(1)?;
        }

        self.high += 1;
        self.occupied += 1;
        Ok(K::from_usize(self.high))
    }

    /// Returns a slot to the free list.
    ///
    /// # Safety
    ///
    /// `key` must be reserved, hold no value, and be unlinked from the ring.
    #[inline]
    pub(crate) unsafe fn release(&mut self, key: K) {
        let free = self.free;
        let links = unsafe { self.links_mut(key) };
        links.prev = K::NONE;
        links.next = free;
        self.free = key;
        self.occupied -= 1;
    }

    /// Ensures `additional` more slots can be reserved without allocating.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        if self.capacity - self.occupied >= additional {
            return Ok(());
        }
        self.grow(additional)
    }

    /// Forgets every slot. Only valid once no slot holds a value.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.high = 0;
        self.free = K::NONE;
        self.occupied = 0;
    }

    /// Releases the buffer of an arena with no reserved slots.
    pub(crate) fn release_buffer(&mut self) {
        debug_assert_eq!(self.occupied, 0);
        self.dealloc_buffer();
        self.ptr = NonNull::dangling();
        self.capacity = 0;
        self.reset();
    }

    /// Reallocates to fit `occupied + additional` slots (at least doubling).
    #[cold]
    fn grow(&mut self, additional: usize) -> Result<(), AllocError> {
        let required = self
            .occupied
            .checked_add(additional)
            .ok_or(AllocError::CapacityOverflow)?;
        if required > K::MAX_NODES {
            return Err(AllocError::CapacityOverflow);
        }

        let new_capacity = required
            .max(self.capacity.saturating_mul(2))
            .max(MIN_CAPACITY)
            .min(K::MAX_NODES);
        let layout = node_layout::<T, K>(new_capacity)?;
        let new_ptr = self.alloc.allocate(layout)?.cast::<Node<T, K>>();

        // Safety: slots below `high` are initialized (links always, values
        // when occupied); the new buffer is at least as large and disjoint.
        unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.high) };

        self.dealloc_buffer();
        self.ptr = new_ptr;
        self.capacity = new_capacity;
        Ok(())
    }

    fn dealloc_buffer(&mut self) {
        if self.capacity == 0 {
            return;
        }
        // Safety: the layout was valid when the buffer was allocated
        let layout = unsafe { node_layout::<T, K>(self.capacity).unwrap_unchecked() };
        // Safety: buffer came from `self.alloc` (or an equal allocator)
        unsafe { self.alloc.deallocate(self.ptr.cast(), layout) };
    }
}

impl<T, K: Key, A: Allocator> Drop for NodeArena<T, K, A> {
    fn drop(&mut self) {
        self.dealloc_buffer();
    }
}

// Safety: the arena owns its nodes; sending it sends the values and allocator
unsafe impl<T: Send, K: Key + Send, A: Allocator + Send> Send for NodeArena<T, K, A> {}
// Safety: shared access only hands out shared references
unsafe impl<T: Sync, K: Key + Sync, A: Allocator + Sync> Sync for NodeArena<T, K, A> {}

/// Layout of `count` nodes: the element allocator rebound to the node type.
#[inline]
pub(crate) fn node_layout<T, K>(count: usize) -> Result<Layout, AllocError> {
    Layout::array::<Node<T, K>>(count).map_err(|_| AllocError::CapacityOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Global;

    type Arena = NodeArena<u64, u32, Global>;

    fn reserve_with(arena: &mut Arena, value: u64) -> u32 {
        let key = arena.reserve_slot().unwrap();
        unsafe { arena.write(key, value) };
        key
    }

    #[test]
    fn new_does_not_allocate() {
        let arena = Arena::new_in(Global);
        assert_eq!(arena.capacity(), 0);
        assert_eq!(arena.occupied(), 0);
    }

    #[test]
    fn first_reserve_allocates_min_capacity() {
        let mut arena = Arena::new_in(Global);
        let key = reserve_with(&mut arena, 42);

        assert_eq!(key, 1);
        assert_eq!(arena.capacity(), MIN_CAPACITY);
        assert_eq!(unsafe { *arena.value(key) }, 42);
    }

    #[test]
    fn grow_preserves_values() {
        let mut arena = Arena::new_in(Global);
        let keys: Vec<_> = (0..100).map(|i| reserve_with(&mut arena, i)).collect();

        assert!(arena.capacity() >= 100);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(unsafe { *arena.value(*key) }, i as u64);
        }
        for key in keys {
            unsafe { arena.take(key) };
        }
        assert_eq!(arena.occupied(), 0);
    }

    #[test]
    fn slot_reuse_is_lifo() {
        let mut arena = Arena::new_in(Global);
        let a = reserve_with(&mut arena, 1);
        let b = reserve_with(&mut arena, 2);

        assert_eq!(unsafe { arena.take(a) }, 1);
        assert_eq!(unsafe { arena.take(b) }, 2);

        // Most recently released slot comes back first
        assert_eq!(arena.reserve_slot().unwrap(), b);
        assert_eq!(arena.reserve_slot().unwrap(), a);
    }

    #[test]
    fn released_slot_is_marked_vacant() {
        let mut arena = Arena::new_in(Global);
        let a = reserve_with(&mut arena, 1);
        unsafe { arena.take(a) };
        assert!(unsafe { arena.links(a) }.prev.is_none());
    }

    #[test]
    fn try_reserve_counts_free_slots() {
        let mut arena = Arena::new_in(Global);
        arena.try_reserve(10).unwrap();
        let capacity = arena.capacity();
        assert!(capacity >= 10);

        for i in 0..10 {
            reserve_with(&mut arena, i);
        }
        assert_eq!(arena.capacity(), capacity);
    }

    #[test]
    fn key_limit_is_capacity_overflow() {
        let mut arena: NodeArena<u8, u8, Global> = NodeArena::new_in(Global);
        assert_eq!(arena.try_reserve(u8::MAX_NODES + 1), Err(AllocError::CapacityOverflow));

        for _ in 0..u8::MAX_NODES {
            arena.reserve_slot().unwrap();
        }
        assert_eq!(arena.reserve_slot(), Err(AllocError::CapacityOverflow));
    }

    #[test]
    fn release_buffer_frees_everything() {
        let mut arena = Arena::new_in(Global);
        let a = reserve_with(&mut arena, 5);
        unsafe { arena.take(a) };
        arena.release_buffer();
        assert_eq!(arena.capacity(), 0);
        assert_eq!(reserve_with(&mut arena, 6), 1);
    }
}
