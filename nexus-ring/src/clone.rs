//! Fallible element copies.
//!
//! [`Clone`] cannot report failure, only panic. Types whose copies can fail
//! (allocation, resource limits, validation) implement [`TryClone`] so that
//! [`Ring::try_clone`](crate::Ring::try_clone) and friends can surface the
//! error after unwinding whatever was already built.

use core::convert::Infallible;
use std::collections::TryReserveError;

/// A copy that reports failure instead of panicking.
pub trait TryClone: Sized {
    /// Error produced when the copy fails.
    type Error;

    /// Returns a copy of `self`.
    fn try_clone(&self) -> Result<Self, Self::Error>;
}

macro_rules! impl_try_clone_copy {
    ($($t:ty),* $(,)?) => {
        $(
            impl TryClone for $t {
                type Error = Infallible;

                #[inline]
                fn try_clone(&self) -> Result<Self, Self::Error> {
                    Ok(*self)
                }
            }
        )*
    };
}

impl_try_clone_copy! {
    usize, u8, u16, u32, u64, u128,
    isize, i8, i16, i32, i64, i128,
    f32, f64,
    bool, char, (),
}

impl<T: ?Sized> TryClone for &T {
    type Error = Infallible;

    #[inline]
    fn try_clone(&self) -> Result<Self, Self::Error> {
        Ok(*self)
    }
}

impl TryClone for String {
    type Error = TryReserveError;

    fn try_clone(&self) -> Result<Self, Self::Error> {
        let mut copy = String::new();
        copy.try_reserve_exact(self.len())?;
        copy.push_str(self);
        Ok(copy)
    }
}

impl<T: TryClone<Error = Infallible>> TryClone for Vec<T> {
    type Error = TryReserveError;

    fn try_clone(&self) -> Result<Self, Self::Error> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(self.len())?;
        for item in self {
            match item.try_clone() {
                Ok(item) => copy.push(item),
                Err(never) => match never {},
            }
        }
        Ok(copy)
    }
}
