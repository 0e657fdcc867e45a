//! Iris Smoke Test - Concurrent Producer/Consumer Workload
//!
//! Menjalankan worker pool sesuai rekomendasi ScalingController dan
//! memverifikasi akuntansi pesan di akhir: semua yang masuk harus keluar,
//! tidak ada duplikasi, tidak ada korupsi.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin iris_smoke -- [duration_secs]
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use iris::{Capsule, LanguageTag, MessageBus, SegmentedBus};

const MSG_SIZE: usize = 128;

fn main() {
    let duration_secs: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    println!("🔥 Iris Smoke Test");
    println!("==================\n");

    let bus: Arc<dyn MessageBus> =
        Arc::new(SegmentedBus::create(16 * 1024 * 1024, 8, LanguageTag::Rust).unwrap());

    let producers = bus.scaling().optimal_producer_count().max(2) as usize;
    let consumers = bus.scaling().optimal_consumer_count().max(2) as usize;

    println!("  Duration: {}s", duration_secs);
    println!("  Workers: {} producers, {} consumers\n", producers, consumers);

    let stop = Arc::new(AtomicBool::new(false));
    let produced = Arc::new(AtomicU64::new(0));
    let consumed = Arc::new(AtomicU64::new(0));
    let checksum_in = Arc::new(AtomicU64::new(0));
    let checksum_out = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();

    for worker in 0..producers {
        let bus = Arc::clone(&bus);
        let stop = Arc::clone(&stop);
        let produced = Arc::clone(&produced);
        let checksum_in = Arc::clone(&checksum_in);
        handles.push(std::thread::spawn(move || {
            let mut seq = 0u64;
            while !stop.load(Ordering::Relaxed) {
                // Tag unik per pesan untuk akuntansi
                let tag = ((worker as u64) << 48) | seq;
                let mut payload = vec![0u8; MSG_SIZE];
                payload[..8].copy_from_slice(&tag.to_le_bytes());

                let msg = Capsule::new(payload, worker as u32, LanguageTag::Rust).unwrap();
                match bus.submit(&msg) {
                    Ok(()) => {
                        produced.fetch_add(1, Ordering::Relaxed);
                        checksum_in.fetch_add(tag, Ordering::Relaxed);
                        seq += 1;
                    }
                    Err(_) => std::thread::yield_now(),
                }
            }
        }));
    }

    for _ in 0..consumers {
        let bus = Arc::clone(&bus);
        let stop = Arc::clone(&stop);
        let consumed = Arc::clone(&consumed);
        let checksum_out = Arc::clone(&checksum_out);
        handles.push(std::thread::spawn(move || loop {
            match bus.drain(LanguageTag::Rust) {
                Ok(capsule) => {
                    let mut tag_bytes = [0u8; 8];
                    tag_bytes.copy_from_slice(&capsule.payload()[..8]);
                    checksum_out.fetch_add(u64::from_le_bytes(tag_bytes), Ordering::Relaxed);
                    consumed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    if stop.load(Ordering::Relaxed) && bus.stats().pending_messages == 0 {
                        break;
                    }
                    std::thread::yield_now();
                }
            }
        }));
    }

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(duration_secs) {
        std::thread::sleep(Duration::from_millis(500));
        let stats = bus.stats();
        println!(
            "  [{:>4.1}s] load {:>3}% | pending {:>6} | recommend {}P/{}C",
            start.elapsed().as_secs_f64(),
            bus.load_percent(),
            stats.pending_messages,
            bus.scaling().optimal_producer_count(),
            bus.scaling().optimal_consumer_count()
        );
    }
    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        handle.join().unwrap();
    }

    let elapsed = start.elapsed();
    let stats = bus.stats();
    let total_produced = produced.load(Ordering::Relaxed);
    let total_consumed = consumed.load(Ordering::Relaxed);

    println!("\n📋 Report");
    println!("  Produced: {}", total_produced);
    println!("  Consumed: {}", total_consumed);
    println!(
        "  Throughput: {:.2} M msgs/sec",
        total_consumed as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
    println!(
        "  Bus stats: {} msgs, {} bytes, {} failed writes, {} failed reads",
        stats.total_messages, stats.total_bytes, stats.failed_writes, stats.failed_reads
    );

    bus.shutdown();

    let ok = total_produced == total_consumed
        && checksum_in.load(Ordering::Relaxed) == checksum_out.load(Ordering::Relaxed)
        && stats.failed_reads == 0;

    if ok {
        println!("\n✅ Smoke test passed: accounting matches, no corruption");
    } else {
        println!("\n❌ Smoke test FAILED: accounting mismatch");
        std::process::exit(1);
    }
}
