//! Allocator capability used for ring node storage.
//!
//! A [`Ring`](crate::Ring) never allocates elements directly. It allocates
//! arrays of nodes (value plus two links), so the layout handed to the
//! allocator is always derived from the node type rather than from `T`.
//!
//! Propagation rules are queried at runtime through the [`Allocator`]
//! methods instead of being resolved through type-level traits:
//!
//! | Operation | Allocator used for the result |
//! |-----------|-------------------------------|
//! | `clone` / `try_clone` | `source.select_on_copy()` |
//! | `clone_assign` | `source` if `target.propagates_on_copy_assignment()`, else `target` |
//! | `move_assign` | `source` unless `!target.propagates_on_move_assignment()` and the two compare equal |

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

/// Memory source for ring node storage.
///
/// # Safety
///
/// Implementations must uphold:
/// - a block returned by `allocate` is valid for reads and writes of
///   `layout.size()` bytes and aligned to `layout.align()`
/// - a block stays valid until passed to `deallocate` on this allocator,
///   a clone of it, or an allocator for which [`is_equal`](Allocator::is_equal)
///   returned `true`
/// - clones may free each other's blocks
pub unsafe trait Allocator: Clone {
    /// Allocates a block for `layout`. `layout.size()` is never zero.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block previously returned by [`allocate`](Allocator::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must denote a live block from this allocator (or an equal one)
    /// and `layout` must be the layout it was allocated with.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Returns the allocator a copy of a container should use.
    #[inline]
    fn select_on_copy(&self) -> Self {
        self.clone()
    }

    /// Whether copy assignment hands the source's allocator to the target.
    #[inline]
    fn propagates_on_copy_assignment(&self) -> bool {
        false
    }

    /// Whether move assignment hands the source's allocator to the target.
    #[inline]
    fn propagates_on_move_assignment(&self) -> bool {
        true
    }

    /// Whether blocks from `other` may be released through `self`.
    #[inline]
    fn is_equal(&self, other: &Self) -> bool {
        let _ = other;
        false
    }
}

/// The process-wide allocator (`std::alloc`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // Safety: callers never request zero-sized blocks
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::Exhausted { layout })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }

    #[inline]
    fn is_equal(&self, _other: &Self) -> bool {
        true
    }
}

/// Error returned when node storage cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested node count overflows the layout or the key type.
    CapacityOverflow,
    /// The allocator could not satisfy the request.
    Exhausted {
        /// Layout that was requested.
        layout: Layout,
    },
}

impl AllocError {
    /// Diverges the way std collections do on allocation failure.
    #[cold]
    pub(crate) fn handle(self) -> ! {
        match self {
            AllocError::CapacityOverflow => panic!("capacity overflow"),
            AllocError::Exhausted { layout } => std::alloc::handle_alloc_error(layout),
        }
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::CapacityOverflow => write!(f, "capacity overflow"),
            AllocError::Exhausted { layout } => write!(
                f,
                "memory allocation of {} bytes (align {}) failed",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl std::error::Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_roundtrip() {
        let layout = Layout::array::<u64>(8).unwrap();
        let ptr = Global.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % layout.align(), 0);

        unsafe {
            ptr.as_ptr().cast::<u64>().write(7);
            assert_eq!(ptr.as_ptr().cast::<u64>().read(), 7);
            Global.deallocate(ptr, layout);
        }
    }

    #[test]
    fn global_defaults() {
        assert!(Global.is_equal(&Global));
        assert!(!Global.propagates_on_copy_assignment());
        assert!(Global.propagates_on_move_assignment());
        assert_eq!(Global.select_on_copy(), Global);
    }

    #[test]
    fn display() {
        let layout = Layout::from_size_align(64, 8).unwrap();
        assert_eq!(
            AllocError::Exhausted { layout }.to_string(),
            "memory allocation of 64 bytes (align 8) failed"
        );
        assert_eq!(AllocError::CapacityOverflow.to_string(), "capacity overflow");
    }
}
