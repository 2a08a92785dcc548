//! Error types for fallible construction and insertion.

use core::fmt;

use crate::AllocError;

/// Error returned when building one or more nodes fails.
///
/// Whatever was built before the failure has already been released by the
/// time this error is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError<E> {
    /// Node storage could not be allocated.
    Alloc(AllocError),
    /// Producing an element failed.
    Element {
        /// Position of the element that failed (number built before it).
        index: usize,
        /// The element's error.
        error: E,
    },
}

impl<E> BuildError<E> {
    /// Returns the element error, if this was not an allocation failure.
    pub fn into_element_error(self) -> Option<E> {
        match self {
            BuildError::Alloc(_) => None,
            BuildError::Element { error, .. } => Some(error),
        }
    }
}

impl<E> From<AllocError> for BuildError<E> {
    fn from(err: AllocError) -> Self {
        BuildError::Alloc(err)
    }
}

impl<E: fmt::Display> fmt::Display for BuildError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Alloc(err) => write!(f, "{}", err),
            BuildError::Element { index, error } => {
                write!(f, "element {} failed to construct: {}", index, error)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BuildError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Alloc(err) => Some(err),
            BuildError::Element { error, .. } => Some(error),
        }
    }
}

/// Error returned when a push cannot allocate its node.
///
/// Carries the rejected value back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryPushError<T> {
    value: T,
    error: AllocError,
}

impl<T> TryPushError<T> {
    pub(crate) fn new(value: T, error: AllocError) -> Self {
        Self { value, error }
    }

    /// Returns the value that could not be inserted.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns the underlying allocation failure.
    pub fn alloc_error(&self) -> AllocError {
        self.error
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push failed: {}", self.error)
    }
}

impl<T: fmt::Debug> std::error::Error for TryPushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
