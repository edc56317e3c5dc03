//! Single-writer, multi-reader sequence lock.
//!
//! One thread publishes plain `Copy` values; any number of threads take
//! torn-free snapshots of the latest one. The writer never waits and readers
//! never lock, they retry when a read overlapped a write.
//!
//! ```
//! use sequin_lock::Seqlock;
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct Quote {
//!     bid: i64,
//!     ask: i64,
//! }
//!
//! let mut lock = Seqlock::new(Quote { bid: 0, ask: 0 });
//! let (mut writer, reader) = lock.split();
//!
//! std::thread::scope(|s| {
//!     s.spawn(move || {
//!         let q = reader.load();
//!         assert!(q == Quote { bid: 0, ask: 0 } || q == Quote { bid: 99, ask: 101 });
//!     });
//!     writer.store(Quote { bid: 99, ask: 101 });
//! });
//! ```
//!
//! Only `Copy` payloads are accepted. Anything owning a resource is rejected
//! at compile time:
//!
//! ```compile_fail
//! use sequin_lock::Seqlock;
//!
//! let lock = Seqlock::new(String::from("owned"));
//! ```
//!
//! ```compile_fail
//! use sequin_lock::Seqlock;
//!
//! struct Handle(u32);
//!
//! impl Drop for Handle {
//!     fn drop(&mut self) {}
//! }
//!
//! let lock: Seqlock<Handle> = Seqlock::new(Handle(3));
//! ```

mod handle;
pub mod layout;
mod seqlock;

pub use handle::{Reader, Writer};
pub use layout::FALSE_SHARING_RANGE;
pub use seqlock::Seqlock;
