//! Allocator-aware circular doubly-linked list.
//!
//! [`Ring`] is a sequence container with O(1) insertion and removal at both
//! ends, bidirectional iteration, and node storage drawn from a pluggable
//! [`Allocator`]. Every node-creating operation is failure-atomic: an
//! allocation failure or a failed element copy unwinds whatever was already
//! built and leaves the container as it was.
//!
//! # Layout
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//!   sentinel ⇄ node(k=3) ⇄ node(k=1) ⇄ node(k=2) ⇄ ─────┘
//!   (in Ring)  └──────── arena slots, one allocation ───┘
//! ```
//!
//! The sentinel lives inside the `Ring` value and closes the chain, so there
//! is no null check anywhere on the hot path. Element nodes live in a
//! per-ring arena addressed by [`Key`] (`u32` by default). Links are keys,
//! not pointers, so moving a `Ring` moves nothing but a few words, and
//! popped nodes are recycled LIFO before the arena grows.
//!
//! # Quick Start
//!
//! ```
//! use nexus_ring::Ring;
//!
//! let mut ring: Ring<u64> = Ring::from([1, 2, 3, 4]);
//! assert_eq!(ring.iter().rev().copied().collect::<Vec<_>>(), vec![4, 3, 2, 1]);
//!
//! ring.push_front(0);
//! assert_eq!(ring.pop_back(), Some(4));
//! assert_eq!(ring, [0, 1, 2, 3]);
//! ```
//!
//! # Fallible Operations
//!
//! Each aborting operation has a `try_` counterpart that reports failure:
//!
//! | Aborting | Fallible | Error |
//! |----------|----------|-------|
//! | `push_back(v)` | `try_push_back(v)` | [`TryPushError`] (returns `v`) |
//! | `push_back_cloned(&v)` | `try_push_back_cloned(&v)` | [`BuildError`] |
//! | `with_capacity_in` | `try_with_capacity_in` | [`AllocError`] |
//! | `from_elem_in` | `try_from_elem_in` | [`BuildError`] |
//! | `clone()` | `try_clone()` | [`BuildError`] |
//! | `clone_assign` | `try_clone_assign` | [`BuildError`] |
//!
//! Element copies that can fail go through [`TryClone`].
//!
//! ```
//! use nexus_ring::{BuildError, Global, Ring};
//!
//! let result: Result<Ring<u32>, _> = Ring::try_from_iter_in(
//!     ["1", "2", "x", "4"].iter().map(|s| s.parse::<u32>()),
//!     Global,
//! );
//!
//! match result {
//!     Err(BuildError::Element { index, .. }) => assert_eq!(index, 2),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! # Allocator Propagation
//!
//! Copy and move semantics follow the allocator's propagation answers; see
//! the [`alloc`] module for the table.

#![warn(missing_docs)]

pub mod alloc;
mod arena;
mod builder;
mod clone;
mod error;
mod iter;
mod key;
mod ring;

pub use alloc::{AllocError, Allocator, Global};
pub use clone::TryClone;
pub use error::{BuildError, TryPushError};
pub use iter::{Cursor, CursorMut, IntoIter, Iter, IterMut};
pub use key::Key;
pub use ring::Ring;
