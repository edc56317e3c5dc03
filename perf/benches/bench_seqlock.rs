use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use sequin_events::Triple;
use sequin_lock::Seqlock;
use sequin_perf::{Wide, make_test_triple};
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn bench_uncontended_triple(c: &mut Criterion) {
    let mut lock = Seqlock::new(make_test_triple());
    let (mut writer, reader) = lock.split();

    let mut group = c.benchmark_group("seqlock");
    group.throughput(Throughput::Elements(1));

    group.bench_function("load (triple)", |b| {
        b.iter(|| black_box(reader.load()));
    });

    group.bench_function("try_load (triple)", |b| {
        b.iter(|| black_box(reader.try_load()));
    });

    let mut n = 0usize;
    group.bench_function("store (triple)", |b| {
        b.iter(|| {
            writer.store(black_box(Triple::new(n)));
            n = n.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_uncontended_wide(c: &mut Criterion) {
    let mut lock = Seqlock::new(Wide::filled(0));
    let (mut writer, reader) = lock.split();

    let mut group = c.benchmark_group("seqlock");
    group.throughput(Throughput::Bytes(size_of::<Wide>() as u64));

    group.bench_function("load (256B)", |b| {
        b.iter(|| black_box(reader.load()));
    });

    let mut v = 0u64;
    group.bench_function("store (256B)", |b| {
        b.iter(|| {
            writer.store(black_box(Wide::filled(v)));
            v = v.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_load_with_writer(c: &mut Criterion) {
    let mut lock = Seqlock::new(Triple::new(0));
    let (mut writer, reader) = lock.split();
    let stop = AtomicBool::new(false);

    let mut group = c.benchmark_group("seqlock_contended");
    group.throughput(Throughput::Elements(1));

    thread::scope(|s| {
        s.spawn(|| {
            let mut n = 0usize;
            while !stop.load(Ordering::Relaxed) {
                writer.store(Triple::new(n));
                n = n.wrapping_add(1);
            }
        });

        group.bench_function("load (triple, busy writer)", |b| {
            b.iter(|| black_box(reader.load()));
        });

        stop.store(true, Ordering::Relaxed);
    });

    group.finish();
}

fn bench_readers_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("seqlock_readers");
    group.throughput(Throughput::Elements(1));

    for &readers in &[1usize, 2, 4, 8] {
        let mut lock = Seqlock::new(Triple::new(0));
        let (mut writer, reader) = lock.split();
        let stop = AtomicBool::new(false);

        thread::scope(|s| {
            // background readers keep the line shared while the writer is measured
            for _ in 0..readers {
                s.spawn(|| {
                    while !stop.load(Ordering::Relaxed) {
                        black_box(reader.load());
                    }
                });
            }

            let mut n = 0usize;
            group.bench_function(format!("store_with_{readers}_readers"), |b| {
                b.iter(|| {
                    writer.store(black_box(Triple::new(n)));
                    n = n.wrapping_add(1);
                });
            });

            stop.store(true, Ordering::Relaxed);
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_triple,
    bench_uncontended_wide,
    bench_load_with_writer,
    bench_readers_scaling,
);
criterion_main!(benches);
