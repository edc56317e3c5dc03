use std::hint::black_box;
use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use sequin_events::Triple;
use sequin_lock::{FALSE_SHARING_RANGE, Seqlock, layout};
use sequin_perf::*;

/// Retry diagnostics from the contended section.
#[derive(Default, serde::Serialize)]
struct ContentionDiag {
    attempts: u64,
    failed_attempts: u64,
    stores: u64,
    torn: u64,
    wide_stores: u64,
    torn_wide: u64,
}

fn main() {
    let rusage_start = capture_rusage();

    let mut results: Vec<BenchResult> = Vec::new();
    let mut diag = ContentionDiag::default();

    // ═══════════════════════════════════════════════════════════════════════
    // 1. Banner
    // ═══════════════════════════════════════════════════════════════════════
    print_banner();

    // ═══════════════════════════════════════════════════════════════════════
    // 2. Memory Layout
    // ═══════════════════════════════════════════════════════════════════════
    section_memory_layout();

    // ═══════════════════════════════════════════════════════════════════════
    // 3. Clock Calibration
    // ═══════════════════════════════════════════════════════════════════════
    section_clock(&mut results);

    // ═══════════════════════════════════════════════════════════════════════
    // 4. Uncontended load/store
    // ═══════════════════════════════════════════════════════════════════════
    section_uncontended(&mut results);

    // ═══════════════════════════════════════════════════════════════════════
    // 5. Reader under a busy writer
    // ═══════════════════════════════════════════════════════════════════════
    section_contended(&mut results, &mut diag);

    // ═══════════════════════════════════════════════════════════════════════
    // 6. Resource Usage
    // ═══════════════════════════════════════════════════════════════════════
    let rusage_end = capture_rusage();
    section_resources(&rusage_start, &rusage_end);

    // ═══════════════════════════════════════════════════════════════════════
    // 7. JSON Output
    // ═══════════════════════════════════════════════════════════════════════
    save_results(&results, &diag, &rusage_start, &rusage_end);
}

// ═══════════════════════════════════════════════════════════════════════════
// Banner
// ═══════════════════════════════════════════════════════════════════════════

fn print_banner() {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  SEQLOCK PERFORMANCE REPORT");
    println!("  layout + uncontended latency + busy-writer latency");
    println!("{bar}\n");

    let os = run_cmd("uname", &["-srm"]).unwrap_or_else(|| "unknown".into());
    let date = run_cmd("date", &["+%Y-%m-%d %H:%M:%S"]).unwrap_or_default();

    println!("  CPUs:    {}", ncpu());
    println!("  OS:      {}", os.trim());
    println!("  Date:    {}", date.trim());
}

// ═══════════════════════════════════════════════════════════════════════════
// Memory Layout
// ═══════════════════════════════════════════════════════════════════════════

fn section_memory_layout() {
    section_header("MEMORY LAYOUT");

    println!(
        "  {:<26} {:>8} {:>8} {:>10} {:>10} {:>8}",
        "Type", "Size", "Align", "Padding", "Ranges", "Padded"
    );
    println!("  {}", "\u{2500}".repeat(79));

    let rows: &[(&str, usize, usize, usize, bool)] = &[
        (
            "Seqlock<u64>",
            layout::footprint::<u64>(),
            align_of::<Seqlock<u64>>(),
            layout::padding::<u64>(),
            layout::is_padded::<u64>(),
        ),
        (
            "Seqlock<Triple>",
            layout::footprint::<Triple>(),
            align_of::<Seqlock<Triple>>(),
            layout::padding::<Triple>(),
            layout::is_padded::<Triple>(),
        ),
        (
            "Seqlock<Wide>",
            layout::footprint::<Wide>(),
            align_of::<Seqlock<Wide>>(),
            layout::padding::<Wide>(),
            layout::is_padded::<Wide>(),
        ),
    ];

    for &(name, size, align, padding, padded) in rows {
        println!(
            "  {:<26} {:>6} B {:>6} B {:>8} B {:>10} {:>8}",
            name,
            size,
            align,
            padding,
            size / FALSE_SHARING_RANGE,
            if padded { "yes" } else { "NO" }
        );
    }

    println!("\n  Notes:");
    println!(
        "    * Triple payload is {} B; the counter and padding fill the rest of one {FALSE_SHARING_RANGE} B range",
        size_of::<Triple>()
    );
    println!(
        "    * Wide payload is {} B and spills into {} ranges",
        size_of::<Wide>(),
        layout::footprint::<Wide>() / FALSE_SHARING_RANGE
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock Calibration
// ═══════════════════════════════════════════════════════════════════════════

fn section_clock(results: &mut Vec<BenchResult>) {
    section_header("CLOCK CALIBRATION");
    print_table_header();

    let r_mono = measure_batched("mono_now_ns()", 1000, 10_000, 100, || {
        black_box(mono_now_ns());
    });
    print_result_row(&r_mono);
    results.push(r_mono.clone());

    let r_instant = measure_batched("Instant::now()", 1000, 10_000, 100, || {
        black_box(Instant::now());
    });
    print_result_row(&r_instant);
    results.push(r_instant.clone());

    let floor = r_mono.stats.p50.min(r_instant.stats.p50);
    println!("\n  * Measurement floor: ~{floor} ns");
    println!("  * All timings below use batched amortisation (10k ops/batch) for ~1ns accuracy");
}

// ═══════════════════════════════════════════════════════════════════════════
// Uncontended
// ═══════════════════════════════════════════════════════════════════════════

fn section_uncontended(results: &mut Vec<BenchResult>) {
    section_header("UNCONTENDED LOAD / STORE");
    print_table_header();

    let mut triple_lock = Seqlock::new(make_test_triple());
    let (mut writer, reader) = triple_lock.split();

    let r = measure_batched("load (triple)", 1000, 10_000, 100, || {
        black_box(black_box(&reader).load());
    });
    print_result_row(&r);
    results.push(r);

    let mut n = 0usize;
    let r = measure_batched("store (triple)", 1000, 10_000, 100, || {
        writer.store(black_box(Triple::new(n)));
        n = n.wrapping_add(1);
    });
    print_result_row(&r);
    results.push(r);

    let mut wide_lock = Seqlock::new(Wide::filled(0));
    let (mut writer, reader) = wide_lock.split();

    let r = measure_batched("load (256B)", 1000, 10_000, 100, || {
        black_box(black_box(&reader).load());
    });
    print_result_row(&r);
    results.push(r);

    let mut v = 0u64;
    let r = measure_batched("store (256B)", 1000, 10_000, 100, || {
        writer.store(black_box(Wide::filled(v)));
        v = v.wrapping_add(1);
    });
    print_result_row(&r);
    results.push(r);
}

// ═══════════════════════════════════════════════════════════════════════════
// Contended — one pinned writer storing in a loop, reader measured
// ═══════════════════════════════════════════════════════════════════════════

fn section_contended(results: &mut Vec<BenchResult>, diag: &mut ContentionDiag) {
    section_header("LOAD UNDER A BUSY WRITER");

    if ncpu() < 2 {
        println!("  Skipped: needs at least 2 CPUs");
        return;
    }

    let mut lock = Seqlock::new(Triple::new(0));
    let (mut writer, reader) = lock.split();
    let stop = AtomicBool::new(false);

    let stores = thread::scope(|s| {
        let writer_thread = s.spawn(|| {
            set_thread_affinity(1);
            let mut n = 0usize;
            while !stop.load(Ordering::Relaxed) {
                writer.store(Triple::new(n));
                n = n.wrapping_add(1);
            }
            n as u64
        });

        set_thread_affinity(0);
        print_table_header();

        let r = measure_batched("load (triple, busy writer)", 1000, 10_000, 100, || {
            let t = black_box(&reader).load();
            if !t.is_consistent() {
                diag.torn += 1;
            }
        });
        print_result_row(&r);
        results.push(r);

        // raw retry rate: how often a single attempt loses the race
        for _ in 0..5_000_000u64 {
            diag.attempts += 1;
            match reader.try_load() {
                Some(t) if !t.is_consistent() => diag.torn += 1,
                Some(_) => {}
                None => diag.failed_attempts += 1,
            }
        }

        stop.store(true, Ordering::Relaxed);
        writer_thread.join().unwrap_or(0)
    });
    diag.stores = stores;

    // 256 B payload: a mixed snapshot shows up as non-uniform words
    let mut wide_lock = Seqlock::new(Wide::filled(0));
    let (mut wide_writer, wide_reader) = wide_lock.split();
    let stop = AtomicBool::new(false);

    let wide_stores = thread::scope(|s| {
        let writer_thread = s.spawn(|| {
            set_thread_affinity(1);
            let mut n = 0u64;
            while !stop.load(Ordering::Relaxed) {
                wide_writer.store(Wide::filled(n));
                n = n.wrapping_add(1);
            }
            n
        });

        set_thread_affinity(0);
        let r = measure_batched("load (wide, busy writer)", 1000, 1_000, 100, || {
            if !black_box(&wide_reader).load().is_uniform() {
                diag.torn_wide += 1;
            }
        });
        print_result_row(&r);
        results.push(r);

        stop.store(true, Ordering::Relaxed);
        writer_thread.join().unwrap_or(0)
    });
    diag.wide_stores = wide_stores;

    let retry_pct = diag.failed_attempts as f64 / diag.attempts.max(1) as f64 * 100.0;
    println!("\n  Writer stores:           {}", format_count(diag.stores));
    println!(
        "  try_load attempts:       {} ({:.2}% lost the race)",
        format_count(diag.attempts),
        retry_pct
    );
    println!("  Torn snapshots:          {}", diag.torn);
    println!("  Wide writer stores:      {}", format_count(diag.wide_stores));
    println!("  Torn wide snapshots:     {}", diag.torn_wide);
}

// ═══════════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════════

fn section_resources(start: &ResourceSnapshot, end: &ResourceSnapshot) {
    section_header("RESOURCE USAGE");

    let delta_minor = end.minor_faults.saturating_sub(start.minor_faults);
    let delta_major = end.major_faults.saturating_sub(start.major_faults);
    let delta_vol = end.vol_ctx_switches.saturating_sub(start.vol_ctx_switches);
    let delta_invol = end
        .invol_ctx_switches
        .saturating_sub(start.invol_ctx_switches);
    let delta_user_us = end.user_time_us.saturating_sub(start.user_time_us);
    let delta_sys_us = end.sys_time_us.saturating_sub(start.sys_time_us);

    println!(
        "  Peak RSS:                    {}",
        format_bytes(end.max_rss_bytes as u64)
    );
    println!("  Minor page faults:           {}", delta_minor);
    println!("  Major page faults:           {}", delta_major);
    println!("  Voluntary ctx switches:      {}", delta_vol);
    println!("  Involuntary ctx switches:    {}", delta_invol);
    println!(
        "  User CPU time:               {:.3}s",
        delta_user_us as f64 / 1e6
    );
    println!(
        "  System CPU time:             {:.3}s",
        delta_sys_us as f64 / 1e6
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Save JSON
// ═══════════════════════════════════════════════════════════════════════════

fn save_results(
    results: &[BenchResult],
    diag: &ContentionDiag,
    rusage_start: &ResourceSnapshot,
    rusage_end: &ResourceSnapshot,
) {
    let timestamp = run_cmd("date", &["+%Y%m%d_%H%M%S"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into());

    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let _ = std::fs::create_dir_all(results_dir);
    let json_path = format!("{results_dir}/{timestamp}_report.json");

    let output = serde_json::json!({
        "report_type": "seqlock",
        "timestamp": timestamp,
        "ncpu": ncpu(),
        "false_sharing_range": FALSE_SHARING_RANGE,
        "benchmarks": results,
        "contention": diag,
        "resources": {
            "start": rusage_start,
            "end": rusage_end,
        },
    });

    let bar = "\u{2550}".repeat(90);
    let written = serde_json::to_string_pretty(&output)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(&json_path, json));
    match written {
        Ok(()) => {
            println!("\n{bar}");
            println!("  Results saved to: {json_path}");
            println!("{bar}\n");
        }
        Err(e) => eprintln!("\n  [failed to save results: {e}]\n"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Hint the OS scheduler to run this thread on a distinct core.
/// Linux: uses sched_setaffinity (hard pin). Elsewhere: no-op.
fn set_thread_affinity(cpu: usize) {
    #[cfg(target_os = "linux")]
    {
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(cpu, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu;
    }
}

fn run_cmd(cmd: &str, args: &[&str]) -> Option<String> {
    std::process::Command::new(cmd)
        .args(args)
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                String::from_utf8(o.stdout).ok()
            } else {
                None
            }
        })
}
