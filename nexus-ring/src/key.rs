//! Key trait for node indices.
//!
//! Nodes of a [`Ring`](crate::Ring) are addressed by a compact integer key
//! rather than by pointer. Two values are reserved:
//!
//! - [`Key::SENTINEL`] (`0`) names the anchor node stored inside the ring
//! - [`Key::NONE`] (`MAX`) terminates the arena free list and marks vacant slots
//!
//! Element keys therefore run from `1` to `MAX - 1`, and element key `k`
//! lives in arena slot `k - 1`.

/// Trait for key types used to address ring nodes.
///
/// Implemented for the unsigned integer types. A narrower key shrinks every
/// node by the width of two links, at the cost of a lower node limit
/// ([`Key::MAX_NODES`]).
///
/// # Example
///
/// ```
/// use nexus_ring::Key;
///
/// assert!(u32::SENTINEL.is_sentinel());
/// assert!(u32::NONE.is_none());
/// assert_eq!(u16::MAX_NODES, u16::MAX as usize - 1);
///
/// let key: u32 = 42;
/// assert!(key.is_some());
/// assert_eq!(key.as_usize(), 42);
/// ```
///
/// # Safety
///
/// Key values are turned into arena offsets without bounds checks, so an
/// implementation must guarantee:
///
/// - `SENTINEL.as_usize() == 0`
/// - `NONE` differs from every key in `0..=MAX_NODES`
/// - `from_usize(i).as_usize() == i` for every `i` in `0..=MAX_NODES`
///
/// Implementing the trait therefore requires `unsafe impl`:
///
/// ```compile_fail
/// use nexus_ring::Key;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// struct Id(u32);
///
/// impl Key for Id {
///     const SENTINEL: Self = Id(0);
///     const NONE: Self = Id(u32::MAX);
///     const MAX_NODES: usize = 16;
///
///     fn from_usize(val: usize) -> Self {
///         Id(val as u32)
///     }
///
///     fn as_usize(self) -> usize {
///         self.0 as usize
///     }
/// }
/// ```
pub unsafe trait Key: Copy + Eq + core::fmt::Debug {
    /// Key of the sentinel node.
    const SENTINEL: Self;

    /// Sentinel value representing "no key" / "null".
    ///
    /// Used internally for the end of the free list and for the `prev` link
    /// of vacant slots.
    const NONE: Self;

    /// Largest number of element nodes addressable with this key type.
    const MAX_NODES: usize;

    /// Creates a key from a `usize` value.
    fn from_usize(val: usize) -> Self;

    /// Returns the key as a `usize`.
    fn as_usize(self) -> usize;

    /// Returns `true` if this is the [`NONE`](Key::NONE) value.
    #[inline]
    fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` if this is NOT the [`NONE`](Key::NONE) value.
    #[inline]
    fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Returns `true` if this is the sentinel key.
    #[inline]
    fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }
}

macro_rules! impl_key_for_unsigned {
    ($($ty:ty),*) => {
        $(
            // Safety: identity conversion below MAX, NONE is MAX
            unsafe impl Key for $ty {
                const SENTINEL: Self = 0;
                const NONE: Self = <$ty>::MAX;
                const MAX_NODES: usize = if (<$ty>::MAX as u128) > (usize::MAX as u128) {
                    usize::MAX - 1
                } else {
                    <$ty>::MAX as usize - 1
                };

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as $ty
                }

                #[inline]
                fn as_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

impl_key_for_unsigned!(u8, u16, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_values() {
        assert_eq!(u8::SENTINEL, 0);
        assert_eq!(u8::NONE, u8::MAX);
        assert_eq!(u32::NONE, u32::MAX);
        assert_eq!(usize::NONE, usize::MAX);

        assert!(u32::SENTINEL.is_sentinel());
        assert!(u32::SENTINEL.is_some());
        assert!(!u32::NONE.is_some());
    }

    #[test]
    fn max_nodes_excludes_reserved() {
        // 0 is the sentinel and MAX is NONE, so keys 1..=MAX-1 are usable.
        assert_eq!(u8::MAX_NODES, 254);
        assert_eq!(u16::MAX_NODES, 65_534);
        assert_eq!(usize::MAX_NODES, usize::MAX - 1);
    }

    #[test]
    fn narrow_keys_map_every_node_index() {
        for i in 0..=u8::MAX_NODES {
            let key = u8::from_usize(i);
            assert_eq!(key.as_usize(), i);
            assert!(key.is_some());
        }
        assert_eq!(u8::SENTINEL.as_usize(), 0);
    }

    #[test]
    fn from_usize_roundtrip() {
        for i in [0usize, 1, 100, 1000, u16::MAX as usize - 1] {
            assert_eq!(u32::from_usize(i).as_usize(), i);
        }
    }
}
