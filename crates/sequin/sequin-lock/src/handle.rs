//! Writer and reader handles for a [`Seqlock`].
//!
//! [`Seqlock::split`] hands out exactly one [`Writer`] per exclusive borrow,
//! which turns the single-writer rule into something the compiler checks.
//!
//! # Thread Safety
//! - `Writer` is `Send` but NOT `Clone` (single-producer).
//! - `Reader` is `Copy`, `Send` and `Sync`; hand a copy to every reading thread.

use crate::Seqlock;

/// The writer side of a seqlock. There is at most one per [`Seqlock::split`].
pub struct Writer<'a, T: Copy> {
    lock: &'a Seqlock<T>,
}

/// The reader side of a seqlock. Copy it freely.
#[derive(Clone, Copy)]
pub struct Reader<'a, T: Copy> {
    lock: &'a Seqlock<T>,
}

impl<'a, T: Copy> Writer<'a, T> {
    #[inline]
    pub(crate) fn new(lock: &'a Seqlock<T>) -> Self {
        Self { lock }
    }

    /// Publishes a new value. Never blocks, regardless of how many readers
    /// are spinning on the lock.
    #[inline]
    pub fn store(&mut self, desired: T) {
        // SAFETY: a `Writer` is only created by `Seqlock::split`, which holds
        // the lock mutably borrowed for `'a`, and `Writer` is not `Clone`, so
        // this is the only thread able to store.
        unsafe { self.lock.store(desired) }
    }

    /// Another reader tied to the same lock.
    #[inline]
    pub fn reader(&self) -> Reader<'a, T> {
        Reader::new(self.lock)
    }

    /// The value this writer last published.
    ///
    /// Never retries: nothing else can be writing.
    #[inline]
    pub fn load(&self) -> T {
        self.lock.load()
    }

    #[inline]
    pub fn sequence(&self) -> usize {
        self.lock.sequence()
    }
}

impl<'a, T: Copy> Reader<'a, T> {
    #[inline]
    pub(crate) fn new(lock: &'a Seqlock<T>) -> Self {
        Self { lock }
    }

    /// See [`Seqlock::load`].
    #[inline]
    pub fn load(&self) -> T {
        self.lock.load()
    }

    /// See [`Seqlock::try_load`].
    #[inline]
    pub fn try_load(&self) -> Option<T> {
        self.lock.try_load()
    }

    #[inline]
    pub fn sequence(&self) -> usize {
        self.lock.sequence()
    }
}
