//! Contention harness for the seqlock.
//!
//! One writer stores correlated [`Triple`]s with a free-running counter while
//! a pool of readers hammers `load()` and checks every snapshot. The run
//! follows a simple handshake:
//!
//! ```text
//! [Writer]  --store(0)--[ready = N]--store(1)--store(2)-- ... --[ready == 0]--done
//!                            |                                      ^
//!                            v                                      |
//! [Reader i] --spin--------[go]--load x reads_per_reader--[ready -= 1]
//! ```
//!
//! Readers never start before the first store, so every value they can see
//! was written through the protocol and must satisfy the correlation.

use crate::StressError;
use sequin_config::StressConfig;
use sequin_events::Triple;
use sequin_lock::{Reader, Seqlock, Writer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How often (in loads) a reader polls the abort flag.
const ABORT_POLL_MASK: u64 = 0xFFFF;

/// Outcome of a successful stress run.
#[derive(Debug, Clone)]
pub struct StressReport {
    /// Number of `store` calls the writer made.
    pub stores: u64,
    /// Total loads across every reader.
    pub reads: u64,
    pub readers: usize,
    pub elapsed: Duration,
}

impl StressReport {
    pub fn reads_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.reads as f64 / secs
    }
}

pub struct StressRunner {
    config: StressConfig,
}

/// Decrements the live-reader count when a reader leaves, even by panic, so
/// the writer never waits on a reader that is gone.
struct Departure<'a>(&'a AtomicUsize);

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl StressRunner {
    pub fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs one writer against `config.readers` readers until every reader has
    /// done `config.reads_per_reader` loads.
    ///
    /// Returns the first violation any reader found.
    pub fn run(&self) -> Result<StressReport, StressError> {
        let readers = self.config.readers;
        let reads_per_reader = self.config.reads_per_reader;

        let mut lock = Seqlock::new(Triple::default());
        let (mut writer, reader) = lock.split();
        let ready = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);

        info!(readers, reads_per_reader, "starting stress run");
        let start = Instant::now();

        let (stores, outcomes) = thread::scope(|s| {
            let handles: Vec<_> = (0..readers)
                .map(|id| {
                    let ready = &ready;
                    let abort = &abort;
                    s.spawn(move || read_loop(id, reader, reads_per_reader, ready, abort))
                })
                .collect();

            let stores = write_loop(&mut writer, readers, &ready, &abort);

            let outcomes: Vec<_> = handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| h.join().unwrap_or(Err(StressError::ReaderPanicked(id))))
                .collect();
            (stores, outcomes)
        });

        let elapsed = start.elapsed();
        let mut reads = 0u64;
        for outcome in outcomes {
            reads += outcome?;
        }

        let report = StressReport {
            stores,
            reads,
            readers,
            elapsed,
        };
        info!(
            stores,
            reads,
            elapsed_ms = elapsed.as_millis() as u64,
            reads_per_sec = report.reads_per_sec() as u64,
            "stress run complete"
        );
        Ok(report)
    }
}

fn write_loop(
    writer: &mut Writer<'_, Triple>,
    readers: usize,
    ready: &AtomicUsize,
    abort: &AtomicBool,
) -> u64 {
    let mut counter = 0usize;
    let mut stores = 0u64;
    loop {
        writer.store(Triple::new(counter));
        counter = counter.wrapping_add(1);
        stores += 1;

        if stores == 1 {
            // release the readers only once there is something to read
            ready.fetch_add(readers, Ordering::AcqRel);
        }
        if ready.load(Ordering::Acquire) == 0 || abort.load(Ordering::Relaxed) {
            return stores;
        }
    }
}

fn read_loop(
    id: usize,
    reader: Reader<'_, Triple>,
    reads: u64,
    ready: &AtomicUsize,
    abort: &AtomicBool,
) -> Result<u64, StressError> {
    while ready.load(Ordering::Acquire) == 0 {
        std::hint::spin_loop();
    }
    let _departure = Departure(ready);

    let mut previous = 0usize;
    for i in 0..reads {
        let snapshot = reader.load();
        if !snapshot.is_consistent() {
            abort.store(true, Ordering::Relaxed);
            error!(reader = id, ?snapshot, "torn snapshot");
            return Err(StressError::Torn {
                reader: id,
                snapshot,
            });
        }
        if snapshot.a < previous {
            abort.store(true, Ordering::Relaxed);
            error!(reader = id, previous, observed = snapshot.a, "snapshot went backwards");
            return Err(StressError::Regressed {
                reader: id,
                previous,
                observed: snapshot.a,
            });
        }
        previous = snapshot.a;

        if i & ABORT_POLL_MASK == 0 && abort.load(Ordering::Relaxed) {
            debug!(reader = id, reads = i, "reader stopping early");
            return Ok(i);
        }
    }

    debug!(reader = id, reads, last_a = previous, "reader finished");
    Ok(reads)
}

/// Quick sanity pass before the long run: plain store/load round trips and a
/// one-reader handshake on a triple.
pub fn smoke() -> Result<(), StressError> {
    let mut lock = Seqlock::new(0i32);
    let (mut writer, reader) = lock.split();
    for expected in [1, 2] {
        writer.store(expected);
        let got = reader.load();
        if got != expected {
            return Err(StressError::Smoke(format!(
                "stored {expected}, loaded {got}"
            )));
        }
    }

    let mut lock = Seqlock::new(Triple::default());
    let (mut writer, reader) = lock.split();
    let target = Triple::new(100);
    let seen = thread::scope(|s| {
        let waiter = s.spawn(move || {
            loop {
                let t = reader.load();
                if t.is_consistent() {
                    return t;
                }
                std::hint::spin_loop();
            }
        });
        writer.store(target);
        waiter.join()
    })
    .map_err(|_| StressError::Smoke("handshake reader panicked".into()))?;

    if seen != target {
        return Err(StressError::Smoke(format!(
            "handshake saw {seen:?}, expected {target:?}"
        )));
    }
    debug!("smoke checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(readers: usize, reads_per_reader: u64) -> StressConfig {
        StressConfig {
            readers,
            reads_per_reader,
            ..StressConfig::default()
        }
    }

    #[test]
    fn smoke_passes() {
        smoke().unwrap();
    }

    #[test]
    fn single_reader_run() {
        let report = StressRunner::new(config(1, 10_000)).run().unwrap();
        assert_eq!(report.readers, 1);
        assert_eq!(report.reads, 10_000);
        assert!(report.stores >= 1);
    }

    #[test]
    fn many_readers_run() {
        let report = StressRunner::new(config(8, 50_000)).run().unwrap();
        assert_eq!(report.reads, 8 * 50_000);
        assert!(report.stores >= 1);
    }

    #[test]
    fn departure_guard_counts_down() {
        let live = AtomicUsize::new(2);
        {
            let _a = Departure(&live);
            let _b = Departure(&live);
        }
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn report_rate_handles_zero_elapsed() {
        let report = StressReport {
            stores: 1,
            reads: 10,
            readers: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.reads_per_sec(), 0.0);
    }
}
