//! Iris - Cross-Language Shared-Memory Message Bus
//!
//! Arsitektur:
//! - Multi-Segment: kontensi per segment, bukan per bus
//! - Mmap-backed: storage pre-allocated, tidak pernah realloc
//! - Non-Blocking: submit/drain selesai dalam waktu terbatas
//! - Flat Frame: header 24 byte + checksum, payload opaque

use std::time::Instant;

use iris::{Capsule, LanguageTag, MessageBus, ScalingConfig, SegmentedBus};

fn main() {
    println!("🚀 Iris Message Bus - v0.1");
    println!("===========================\n");

    benchmark_segment_roundtrip();
    benchmark_bus_throughput();
    demo_scaling();

    println!("\n✅ All benchmarks complete!");
    println!("\nFor concurrent smoke test: cargo run --release --bin iris_smoke");
}

fn benchmark_segment_roundtrip() {
    println!("📊 Single-Segment Roundtrip");
    println!("---------------------------");

    const ITERATIONS: usize = 1_000_000;
    const MSG_SIZE: usize = 64;

    let bus = SegmentedBus::create(4 * 1024 * 1024, 1, LanguageTag::Rust).unwrap();
    let msg = Capsule::new(vec![0u8; MSG_SIZE], 1, LanguageTag::Rust).unwrap();

    // Warm up
    for _ in 0..1000 {
        bus.submit(&msg).unwrap();
        bus.drain(LanguageTag::Rust).unwrap();
    }

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        bus.submit(&msg).unwrap();
        bus.drain(LanguageTag::Rust).unwrap();
    }
    let duration = start.elapsed();

    let ns = duration.as_nanos() as f64 / ITERATIONS as f64;
    println!("  Message size: {} bytes", MSG_SIZE);
    println!("  Operations: {}", ITERATIONS);
    println!(
        "  Roundtrip latency: {:.2} ns/op ({:.3} μs/op)",
        ns,
        ns / 1000.0
    );
    println!(
        "  Throughput: {:.2} M msgs/sec\n",
        ITERATIONS as f64 / duration.as_secs_f64() / 1_000_000.0
    );
}

fn benchmark_bus_throughput() {
    println!("📊 Multi-Segment Bus (8 segments)");
    println!("---------------------------------");

    const ITERATIONS: usize = 500_000;
    const MSG_SIZE: usize = 256;

    let bus = SegmentedBus::create(16 * 1024 * 1024, 8, LanguageTag::Rust).unwrap();
    let msg = Capsule::new(vec![7u8; MSG_SIZE], 2, LanguageTag::Rust).unwrap();

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        if bus.submit(&msg).is_err() {
            bus.drain(LanguageTag::Rust).ok();
            bus.submit(&msg).ok();
        }
    }
    let submit_duration = start.elapsed();

    let start = Instant::now();
    let mut drained = 0usize;
    while bus.drain(LanguageTag::Rust).is_ok() {
        drained += 1;
    }
    let drain_duration = start.elapsed();

    let submit_ns = submit_duration.as_nanos() as f64 / ITERATIONS as f64;
    let drain_ns = drain_duration.as_nanos() as f64 / drained.max(1) as f64;

    println!("  Message size: {} bytes", MSG_SIZE);
    println!("  Submit latency: {:.2} ns/op", submit_ns);
    println!("  Drain latency:  {:.2} ns/op", drain_ns);
    println!(
        "  Submit throughput: {:.2} MB/sec",
        (ITERATIONS * MSG_SIZE) as f64 / submit_duration.as_secs_f64() / 1_000_000.0
    );

    let stats = bus.stats();
    println!(
        "  Stats: {} msgs, {} bytes, {} failed writes\n",
        stats.total_messages, stats.total_bytes, stats.failed_writes
    );
}

fn demo_scaling() {
    println!("📊 Auto-Scaling Demo");
    println!("--------------------");

    let bus = SegmentedBus::with_config(
        256 * 1024,
        4,
        LanguageTag::Rust,
        ScalingConfig {
            scale_cooldown: std::time::Duration::ZERO,
            ..ScalingConfig::default()
        },
    )
    .unwrap();

    println!(
        "  Initial recommendation: {} producers, {} consumers",
        bus.scaling().optimal_producer_count(),
        bus.scaling().optimal_consumer_count()
    );

    // Isi bus sampai penuh lalu evaluasi
    let msg = Capsule::new(vec![0u8; 4096], 0, LanguageTag::Rust).unwrap();
    while bus.submit(&msg).is_ok() {}
    bus.scaling().evaluate(bus.load_percent());

    println!("  Load: {}%", bus.load_percent());
    println!(
        "  Under pressure: {} producers, {} consumers",
        bus.scaling().optimal_producer_count(),
        bus.scaling().optimal_consumer_count()
    );

    // Kosongkan lalu evaluasi lagi
    while bus.drain(LanguageTag::Rust).is_ok() {}
    bus.scaling().evaluate(bus.load_percent());
    bus.scaling().evaluate(bus.load_percent());

    println!(
        "  After drain: {} producers, {} consumers",
        bus.scaling().optimal_producer_count(),
        bus.scaling().optimal_consumer_count()
    );
}
