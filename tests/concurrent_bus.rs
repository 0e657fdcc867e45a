//! Integration test: bus di bawah beban concurrent.
//!
//! Properti yang diverifikasi:
//! - Setiap pesan yang berhasil submit keluar tepat sekali (no loss,
//!   no duplication)
//! - Payload tidak pernah korup lintas thread
//! - Backpressure deterministik: penuh tetap penuh sampai drain
//! - Scaling bereaksi pada load dan ditahan cooldown

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use iris::{BusError, Capsule, LanguageTag, MessageBus, ScalingConfig, SegmentedBus};

#[test]
fn test_concurrent_producers_consumers_exactly_once() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: u64 = 5_000;

    let bus: Arc<SegmentedBus> =
        Arc::new(SegmentedBus::create(8 * 1024 * 1024, 8, LanguageTag::Rust).unwrap());
    let done_producing = Arc::new(AtomicBool::new(false));

    let mut producers = Vec::new();
    for worker in 0..PRODUCERS as u64 {
        let bus = Arc::clone(&bus);
        producers.push(std::thread::spawn(move || {
            for seq in 0..PER_PRODUCER {
                let tag = (worker << 32) | seq;
                let mut payload = vec![0u8; 64];
                payload[..8].copy_from_slice(&tag.to_le_bytes());
                let msg = Capsule::new(payload, worker as u32, LanguageTag::Rust).unwrap();
                loop {
                    match bus.submit(&msg) {
                        Ok(()) => break,
                        Err(BusError::BufferFull) => std::thread::yield_now(),
                        Err(e) => panic!("unexpected submit error: {e}"),
                    }
                }
            }
        }));
    }

    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
        let bus = Arc::clone(&bus);
        let done = Arc::clone(&done_producing);
        consumers.push(std::thread::spawn(move || {
            let mut seen = Vec::new();
            loop {
                match bus.drain(LanguageTag::Rust) {
                    Ok(capsule) => {
                        assert_eq!(capsule.size(), 64);
                        let mut tag_bytes = [0u8; 8];
                        tag_bytes.copy_from_slice(&capsule.payload()[..8]);
                        seen.push(u64::from_le_bytes(tag_bytes));
                    }
                    Err(BusError::BufferEmpty) => {
                        if done.load(Ordering::Acquire) && bus.stats().pending_messages == 0 {
                            break;
                        }
                        std::thread::yield_now();
                    }
                    Err(e) => panic!("unexpected drain error: {e}"),
                }
            }
            seen
        }));
    }

    for p in producers {
        p.join().unwrap();
    }
    done_producing.store(true, Ordering::Release);

    let mut all: Vec<u64> = Vec::new();
    for c in consumers {
        all.extend(c.join().unwrap());
    }

    // Exactly-once: jumlah cocok dan tidak ada tag ganda
    assert_eq!(all.len() as u64, PRODUCERS as u64 * PER_PRODUCER);
    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len(), "ada pesan duplikat");

    // Semua tag yang diharapkan hadir
    for worker in 0..PRODUCERS as u64 {
        for seq in 0..PER_PRODUCER {
            assert!(unique.contains(&((worker << 32) | seq)));
        }
    }

    let stats = bus.stats();
    assert_eq!(stats.total_messages, PRODUCERS as u64 * PER_PRODUCER);
    assert_eq!(stats.failed_reads, 0);
}

#[test]
fn test_payload_integrity_under_contention() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;

    let bus: Arc<SegmentedBus> =
        Arc::new(SegmentedBus::create(4 * 1024 * 1024, 4, LanguageTag::Rust).unwrap());
    let corrupted = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for worker in 0..THREADS {
        let bus = Arc::clone(&bus);
        let corrupted = Arc::clone(&corrupted);
        handles.push(std::thread::spawn(move || {
            // Tiap thread bergantian submit dan drain; pattern payload
            // harus selalu utuh apapun interleaving-nya.
            let fill = worker as u8;
            let msg = Capsule::new(vec![fill; 512], fill as u32, LanguageTag::Rust).unwrap();
            for _ in 0..PER_THREAD {
                while bus.submit(&msg).is_err() {
                    bus.drain(LanguageTag::Rust).ok();
                }
                if let Ok(capsule) = bus.drain(LanguageTag::Rust) {
                    let expect = capsule.type_id() as u8;
                    if capsule.payload().iter().any(|&b| b != expect) {
                        corrupted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(corrupted.load(Ordering::Relaxed), 0);
    assert_eq!(bus.stats().failed_reads, 0);
}

#[test]
fn test_load_sampling_under_concurrent_traffic() {
    // Regression: load_percent dan stats dibaca bersamaan dengan traffic
    // submit/drain tidak boleh underflow (load > 100) atau melihat
    // pending yang wrap. Satu segment memaksa semua thread beradu di
    // pasangan cursor yang sama.
    const SUBMITTERS: usize = 4;
    const DRAINERS: usize = 4;
    const SAMPLERS: usize = 2;
    const PER_SUBMITTER: u64 = 10_000;

    let bus: Arc<SegmentedBus> =
        Arc::new(SegmentedBus::create(64 * 1024, 1, LanguageTag::Rust).unwrap());
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..SUBMITTERS {
        let bus = Arc::clone(&bus);
        handles.push(std::thread::spawn(move || {
            let msg = Capsule::new(vec![1u8; 48], 0, LanguageTag::Rust).unwrap();
            for _ in 0..PER_SUBMITTER {
                // submit memanggil load_percent lewat scaling tick, jadi
                // worker sendiri ikut menyentuh snapshot counter
                while bus.submit(&msg).is_err() {
                    std::thread::yield_now();
                }
            }
        }));
    }
    for _ in 0..DRAINERS {
        let bus = Arc::clone(&bus);
        let stop = Arc::clone(&stop);
        handles.push(std::thread::spawn(move || loop {
            match bus.drain(LanguageTag::Rust) {
                Ok(_) => {}
                Err(BusError::BufferEmpty) => {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    std::thread::yield_now();
                }
                Err(e) => panic!("unexpected drain error: {e}"),
            }
        }));
    }

    let mut samplers = Vec::new();
    for _ in 0..SAMPLERS {
        let bus = Arc::clone(&bus);
        let stop = Arc::clone(&stop);
        samplers.push(std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                assert!(bus.load_percent() <= 100);
                let stats = bus.stats();
                assert!(stats.pending_messages <= 4096, "pending wrap");
                assert!(stats.active_segments <= 1);
            }
        }));
    }

    // Submitter selesai dulu, lalu drainer dan sampler dihentikan
    let submitter_count = SUBMITTERS;
    for handle in handles.drain(..submitter_count) {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::Release);
    for handle in handles {
        handle.join().unwrap();
    }
    for sampler in samplers {
        sampler.join().unwrap();
    }

    let stats = bus.stats();
    assert_eq!(stats.total_messages, (SUBMITTERS as u64) * PER_SUBMITTER);
    assert_eq!(stats.pending_messages, 0);
    assert_eq!(stats.failed_reads, 0);
}

#[test]
fn test_backpressure_sweep_across_sizes() {
    for &size in &[16usize, 100, 1024, 4096] {
        let bus = SegmentedBus::create(256 * 1024, 4, LanguageTag::C).unwrap();
        let msg = Capsule::new(vec![0xAB; size], 0, LanguageTag::C).unwrap();

        let mut accepted = 0u64;
        while bus.submit(&msg).is_ok() {
            accepted += 1;
        }
        assert!(accepted > 0, "size {size}: tidak ada yang diterima");
        assert_eq!(bus.submit(&msg).unwrap_err(), BusError::BufferFull);

        // Drain satu lalu submit harus bisa lagi
        bus.drain(LanguageTag::C).unwrap();
        assert!(bus.submit(&msg).is_ok(), "size {size}: slot bekas drain tidak terpakai");

        let mut drained = 0u64;
        while bus.drain(LanguageTag::C).is_ok() {
            drained += 1;
        }
        assert_eq!(drained, accepted, "size {size}: hilang atau dobel");
    }
}

#[test]
fn test_oversized_message_rejected_not_buffered() {
    let bus = SegmentedBus::create(1024 * 1024, 4, LanguageTag::C).unwrap();
    assert_eq!(
        Capsule::new(vec![0u8; iris::MAX_PAYLOAD_SIZE + 1], 0, LanguageTag::C).unwrap_err(),
        BusError::InvalidParams
    );
    // Tepat di limit harus lolos validasi dan masuk bus
    let msg = Capsule::new(vec![0u8; iris::MAX_PAYLOAD_SIZE], 0, LanguageTag::C).unwrap();
    bus.submit(&msg).unwrap();
    assert_eq!(bus.drain(LanguageTag::C).unwrap().size(), iris::MAX_PAYLOAD_SIZE);
}

#[test]
fn test_scaling_hysteresis_with_cooldown() {
    let bus = SegmentedBus::with_config(
        64 * 1024,
        2,
        LanguageTag::Rust,
        ScalingConfig {
            scale_cooldown: Duration::from_millis(200),
            ..ScalingConfig::default()
        },
    )
    .unwrap();

    // Isi sampai load di atas threshold
    let msg = Capsule::new(vec![0u8; 1024], 0, LanguageTag::Rust).unwrap();
    while bus.submit(&msg).is_ok() {}
    assert!(bus.load_percent() >= 75);

    // Evaluasi berulang dalam satu jendela cooldown: maksimal satu kenaikan
    for _ in 0..50 {
        bus.scaling().evaluate(bus.load_percent());
    }
    assert_eq!(bus.scaling().optimal_producer_count(), 2);

    // Setelah cooldown lewat, naik lagi
    std::thread::sleep(Duration::from_millis(250));
    bus.scaling().evaluate(bus.load_percent());
    assert_eq!(bus.scaling().optimal_producer_count(), 4);

    // Drain sampai kosong: load rendah menyusutkan rekomendasi
    while bus.drain(LanguageTag::Rust).is_ok() {}
    std::thread::sleep(Duration::from_millis(250));
    bus.scaling().evaluate(bus.load_percent());
    assert!(bus.scaling().optimal_producer_count() < 4);
}

#[test]
fn test_shutdown_freezes_scaling() {
    let bus = SegmentedBus::with_config(
        64 * 1024,
        2,
        LanguageTag::Rust,
        ScalingConfig {
            scale_cooldown: Duration::ZERO,
            ..ScalingConfig::default()
        },
    )
    .unwrap();

    bus.scaling().evaluate(90);
    let frozen = bus.scaling().optimal_producer_count();
    bus.shutdown();
    bus.scaling().evaluate(95);
    assert_eq!(bus.scaling().optimal_producer_count(), frozen);
}
