//! Seqlock (sequence lock) for lock-free single-writer, multi-reader access.
//!
//! A seqlock lets one writer and any number of readers share a plain value
//! without blocking. The writer bumps a sequence number before and after
//! writing; readers detect overlapping writes by checking whether the
//! sequence moved while they copied.
//!
//! # Protocol
//!
//! **Writer:**
//! 1. Bump seq to odd (signals "write in progress")
//! 2. Write data
//! 3. Bump seq to even (signals "write complete")
//!
//! **Reader:**
//! 1. Read seq
//! 2. Copy data
//! 3. Read seq again; if it changed or was odd, retry from step 1
//! 4. Return data (guaranteed consistent)
//!
//! # Trade-offs
//!
//! - **Pros**: writer never waits, readers never lock, great for read-heavy workloads
//! - **Cons**: readers spin while a write is in flight, requires `Copy` data

use crate::handle::{Reader, Writer};
use crate::layout::FALSE_SHARING_RANGE;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering, compiler_fence, fence};

/// A value protected by a sequence lock.
///
/// `T` must be `Copy`: a copy is then always a flat `memcpy` that cannot fail
/// and runs no user code, and `T` cannot own anything that a torn read could
/// double-free. Types that fail this bound are rejected at compile time.
///
/// # Memory Layout
///
/// Aligned to [`FALSE_SHARING_RANGE`] so the whole structure occupies whole
/// 128-byte ranges; see [`crate::layout`].
///
/// # Sequence Number Semantics
///
/// - **Even**: Data is stable, safe to read
/// - **Odd**: Write in progress, readers must retry
#[repr(C, align(128))]
pub struct Seqlock<T: Copy> {
    /// The protected payload.
    value: UnsafeCell<T>,
    /// Sequence counter: odd = write in progress, even = stable.
    seq: AtomicUsize,
}

// SAFETY: readers only ever copy `value` out and validate the copy against
// `seq`; mutation goes through `store`, whose single-writer contract is either
// upheld by the caller (`unsafe fn store`) or by the borrow checker (`Writer`).
unsafe impl<T: Copy + Send> Sync for Seqlock<T> {}

impl<T: Copy> Seqlock<T> {
    /// Checked once per `T` when `new` is instantiated. A `T` aligned above
    /// 128 bytes lifts the lock to that alignment, a larger multiple of the
    /// range, and is accepted.
    const LAYOUT: () = {
        assert!(
            std::mem::align_of::<Self>() % FALSE_SHARING_RANGE == 0,
            "Seqlock<T> must be aligned to a multiple of FALSE_SHARING_RANGE"
        );
        assert!(
            std::mem::size_of::<Self>() % FALSE_SHARING_RANGE == 0,
            "size_of::<Seqlock<T>>() must be a multiple of FALSE_SHARING_RANGE"
        );
    };

    /// Creates a seqlock holding `value`, with the sequence at 0 (stable).
    #[inline]
    pub const fn new(value: T) -> Self {
        let () = Self::LAYOUT;
        Self {
            value: UnsafeCell::new(value),
            seq: AtomicUsize::new(0),
        }
    }

    /// Reads a consistent snapshot of the value, spinning while it races a
    /// write.
    ///
    /// Never blocks and never takes a lock. Each attempt is a constant amount
    /// of work; the loop only repeats when an attempt overlapped a `store`.
    #[cfg_attr(debug_assertions, inline(never))]
    #[cfg_attr(not(debug_assertions), inline)]
    pub fn load(&self) -> T {
        loop {
            if let Some(value) = self.try_load() {
                return value;
            }
            std::hint::spin_loop();
        }
    }

    /// Makes a single attempt at reading a consistent snapshot.
    ///
    /// Returns `None` if a write was in progress when the attempt started or
    /// completed while it ran. Callers that want a bounded wait loop on this
    /// with their own budget.
    ///
    /// # Protocol Steps
    /// 1. Load seq with Acquire ordering
    /// 2. Compiler fence so the copy stays below that load
    /// 3. Copy the data into uninitialized storage (it may be torn)
    /// 4. Acquire fence so the copy cannot sink below the next load
    /// 5. Load seq again
    /// 6. Accept the copy only if both loads agree and are even
    #[inline]
    pub fn try_load(&self) -> Option<T> {
        let seq0 = self.seq.load(Ordering::Acquire);
        compiler_fence(Ordering::AcqRel);

        // SAFETY: the pointer is valid and aligned for the lifetime of `self`.
        // The copy lands in `MaybeUninit`, so a torn snapshot is never
        // observed as a `T` unless the sequence check below passes.
        let copy = unsafe { ptr::read_volatile(self.value.get() as *const MaybeUninit<T>) };

        fence(Ordering::Acquire);
        let seq1 = self.seq.load(Ordering::Acquire);

        if seq0 != seq1 || seq0 & 1 == 1 {
            return None;
        }

        // SAFETY: the sequence was even and unchanged across the copy, so no
        // store overlapped it and the bytes are one complete `T`.
        Some(unsafe { copy.assume_init() })
    }

    /// Publishes `desired` using the seqlock protocol.
    ///
    /// # Protocol Steps
    /// 1. Load current sequence number (Relaxed; only the writer changes it)
    /// 2. Store `seq + 1` (odd) with Release ordering → signals "write starting"
    /// 3. Release fence, write the data, compiler fence
    /// 4. Store `seq + 2` (even) with Release ordering → signals "write complete"
    ///
    /// The counter wraps on overflow; parity is unaffected.
    ///
    /// # Safety
    ///
    /// No other `store` on this seqlock may run concurrently. Two overlapping
    /// writers can leave the sequence even while the value is torn. Prefer
    /// [`Seqlock::split`], whose [`Writer`] makes this structural.
    #[cfg_attr(debug_assertions, inline(never))]
    #[cfg_attr(not(debug_assertions), inline)]
    pub unsafe fn store(&self, desired: T) {
        let seq0 = self.seq.load(Ordering::Relaxed);
        // Mark write-in-progress (odd sequence number)
        self.seq.store(seq0.wrapping_add(1), Ordering::Release);
        // Keeps the payload writes below the odd store; pairs with the
        // reader's acquire fence.
        fence(Ordering::Release);

        // SAFETY: the caller guarantees we are the only writer; readers only
        // read through `read_volatile` and discard what they cannot validate.
        unsafe { ptr::write_volatile(self.value.get(), desired) };

        compiler_fence(Ordering::AcqRel);
        // Mark write-complete (even sequence number)
        self.seq.store(seq0.wrapping_add(2), Ordering::Release);
    }

    /// Current value of the sequence counter.
    ///
    /// Even means stable; it advances by two per completed `store`.
    #[inline]
    pub fn sequence(&self) -> usize {
        self.seq.load(Ordering::Acquire)
    }

    /// Splits the seqlock into its single writer and a copyable reader.
    ///
    /// The exclusive borrow means no second `Writer` can be created until
    /// both handles (and every copy of the reader) are gone.
    #[inline]
    pub fn split(&mut self) -> (Writer<'_, T>, Reader<'_, T>) {
        let lock: &Self = self;
        (Writer::new(lock), Reader::new(lock))
    }

    /// Mutable access to the value. No protocol needed: `&mut self` rules
    /// out every reader.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Copy + Default> Default for Seqlock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Seqlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Seqlock");
        d.field("sequence", &self.sequence());
        match self.try_load() {
            Some(value) => d.field("value", &value),
            None => d.field("value", &format_args!("<write in progress>")),
        };
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Data {
        a: usize,
        b: usize,
        c: usize,
    }

    impl Data {
        fn new(a: usize) -> Self {
            Self {
                a,
                b: a + 100,
                c: 2 * a + 100,
            }
        }

        fn is_consistent(&self) -> bool {
            self.b == self.a + 100 && self.c == self.a + self.b
        }
    }

    #[test]
    fn store_then_load() {
        let lock = Seqlock::new(0i32);
        unsafe { lock.store(1) };
        assert_eq!(lock.load(), 1);
        unsafe { lock.store(2) };
        assert_eq!(lock.load(), 2);
    }

    #[test]
    fn load_returns_initial_value_before_any_store() {
        let lock = Seqlock::new(Data::new(7));
        assert_eq!(lock.load(), Data::new(7));
        assert_eq!(lock.sequence(), 0);
    }

    #[test]
    fn default_starts_at_zero() {
        let lock: Seqlock<Data> = Seqlock::default();
        assert_eq!(lock.load(), Data::default());
        assert_eq!(lock.sequence(), 0);
    }

    #[test]
    fn sequence_advances_by_two_per_store() {
        let lock = Seqlock::new(0u64);
        unsafe { lock.store(1) };
        assert_eq!(lock.sequence(), 2);
        unsafe { lock.store(2) };
        assert_eq!(lock.sequence(), 4);
    }

    #[test]
    fn try_load_refuses_while_write_in_flight() {
        let lock = Seqlock::new(5u32);
        lock.seq.store(1, Ordering::Relaxed);
        assert_eq!(lock.try_load(), None);

        lock.seq.store(2, Ordering::Relaxed);
        assert_eq!(lock.try_load(), Some(5));
    }

    #[test]
    fn sequence_wraps_and_stays_even() {
        let lock = Seqlock::new(0u8);
        lock.seq.store(usize::MAX - 1, Ordering::Relaxed);

        unsafe { lock.store(9) };
        assert_eq!(lock.sequence(), 0);
        assert_eq!(lock.load(), 9);

        unsafe { lock.store(10) };
        assert_eq!(lock.sequence(), 2);
        assert_eq!(lock.load(), 10);
    }

    #[test]
    fn every_store_is_visible_in_order_single_threaded() {
        let lock = Seqlock::new(Data::default());
        for n in 0..10_000 {
            unsafe { lock.store(Data::new(n)) };
            assert_eq!(lock.load(), Data::new(n));
        }
    }

    #[test]
    fn get_mut_and_into_inner_bypass_the_protocol() {
        let mut lock = Seqlock::new([0u16; 4]);
        lock.get_mut()[2] = 3;
        assert_eq!(lock.sequence(), 0);
        assert_eq!(lock.load(), [0, 0, 3, 0]);
        assert_eq!(lock.into_inner(), [0, 0, 3, 0]);
    }

    #[test]
    fn layout_is_padded_to_false_sharing_range() {
        assert_eq!(align_of::<Seqlock<u8>>(), FALSE_SHARING_RANGE);
        assert_eq!(size_of::<Seqlock<u8>>(), FALSE_SHARING_RANGE);
        assert_eq!(size_of::<Seqlock<[u64; 32]>>() % FALSE_SHARING_RANGE, 0);
        assert_eq!(size_of::<Seqlock<Data>>() % FALSE_SHARING_RANGE, 0);
    }

    #[test]
    fn debug_shows_value_or_write_marker() {
        let lock = Seqlock::new(42u64);
        let out = format!("{lock:?}");
        assert!(out.contains("Seqlock"));
        assert!(out.contains("42"));

        lock.seq.store(3, Ordering::Relaxed);
        let out = format!("{lock:?}");
        assert!(out.contains("<write in progress>"));
    }

    #[test]
    fn reader_sees_final_store_after_handshake() {
        let lock = Seqlock::new(Data::default());
        thread::scope(|s| {
            let reader = s.spawn(|| {
                loop {
                    let d = lock.load();
                    if d.a + 100 == d.b && d.c == d.a + d.b {
                        return d;
                    }
                }
            });
            unsafe { lock.store(Data { a: 100, b: 200, c: 300 }) };
            assert_eq!(reader.join().unwrap(), Data { a: 100, b: 200, c: 300 });
        });
    }

    #[test]
    fn concurrent_readers_never_see_torn_values() {
        let lock = Seqlock::new(Data::new(0));
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut last = 0;
                        while !done.load(Ordering::Relaxed) {
                            let d = lock.load();
                            assert!(d.is_consistent(), "torn read: {d:?}");
                            assert!(d.a >= last, "went backwards: {} -> {}", last, d.a);
                            last = d.a;
                        }
                    })
                })
                .collect();

            for n in 1..=200_000 {
                unsafe { lock.store(Data::new(n)) };
            }
            done.store(true, Ordering::Relaxed);

            for r in readers {
                r.join().unwrap();
            }
        });

        assert_eq!(lock.load(), Data::new(200_000));
    }
}
