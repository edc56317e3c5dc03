//! Memory layout of a [`Seqlock`](crate::Seqlock).
//!
//! The payload sits first, at a 128-byte boundary, and the sequence counter
//! follows it. Rust rounds the size of a type up to a multiple of its
//! alignment, so the tail padding falls out of the alignment directive:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  value: T         │  seq: AtomicUsize  │  padding            │
//! │  (size_of::<T>)   │  (word)            │  (to next 128B)     │
//! └──────────────────────────────────────────────────────────────┘
//!  ^ 128-byte aligned                        size % 128 == 0
//! ```
//!
//! 128 bytes covers the 64-byte lines of x86 as well as the 128-byte lines
//! (or adjacent-line prefetch pairs) found on Apple silicon and recent Intel
//! parts, so nothing placed next to a seqlock shares a line with it.

use crate::Seqlock;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicUsize;

/// Granularity the seqlock is aligned and padded to.
///
/// Must agree with the literal in `#[repr(C, align(128))]` on [`Seqlock`].
pub const FALSE_SHARING_RANGE: usize = 128;

/// Total bytes occupied by a `Seqlock<T>`, padding included.
#[inline]
pub const fn footprint<T: Copy>() -> usize {
    size_of::<Seqlock<T>>()
}

/// Bytes of padding the layout adds on top of the payload and the counter.
#[inline]
pub const fn padding<T: Copy>() -> usize {
    footprint::<T>() - size_of::<T>() - size_of::<AtomicUsize>()
}

/// `true` when `Seqlock<T>` satisfies the false-sharing layout rules.
///
/// Mirrors the assertion `Seqlock::new` runs at compile time. A payload
/// aligned above the range lifts the whole lock to its alignment, which is
/// still a multiple of the range.
#[inline]
pub const fn is_padded<T: Copy>() -> bool {
    align_of::<Seqlock<T>>() % FALSE_SHARING_RANGE == 0
        && footprint::<T>() % FALSE_SHARING_RANGE == 0
}
