//! Bus: agregat segment + seleksi + akuntansi global
//!
//! Bus tidak pernah menyentuh internal segment; dia hanya memilih
//! segment kandidat dan memutasi counter agregat. Kontensi pada satu
//! segment diserialisasi oleh segment itu sendiri, tidak pernah oleh
//! lock selebar bus.
//!
//! Seleksi adalah heuristik load-balance, BUKAN jaminan urutan global:
//! FIFO hanya berlaku per segment. Trade ini disengaja demi paralelisme.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::accel;
use crate::core::scaling::{ScalingConfig, ScalingController};
use crate::core::segment::{align_segment_capacity, Segment};
use crate::error::{BusError, BusResult};
use crate::protocol::frame::frame_size;
use crate::protocol::{Capsule, LanguageTag, MAX_PAYLOAD_SIZE};

/// Batas atas jumlah segment per bus.
pub const MAX_SEGMENTS: usize = 64;

/// Snapshot statistik bus. Counter kumulatif monotonic; field pending
/// bersifat point-in-time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub total_messages: u64,
    pub total_bytes: u64,
    pub failed_writes: u64,
    pub failed_reads: u64,
    pub pending_messages: u32,
    pub active_segments: u32,
}

/// Snapshot konfigurasi bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub total_capacity: usize,
    pub segment_count: usize,
    pub segment_capacity: usize,
    pub max_message_size: usize,
}

/// Interface bus yang dilihat boundary layer.
///
/// Object-safe supaya engine fallback (mock) bisa dipilih saat startup
/// sebagai varian polimorfik, bukan branch di call site.
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Submit satu capsule. Non-blocking; `BufferFull` kalau tidak ada
    /// segment yang bisa menerima.
    fn submit(&self, capsule: &Capsule) -> BusResult<()>;

    /// Drain satu capsule tertua dari segment paling terbebani.
    /// Copy yang dikembalikan dimiliki caller.
    fn drain(&self, requester: LanguageTag) -> BusResult<Capsule>;

    /// Snapshot statistik.
    fn stats(&self) -> BusStats;

    /// Fill ratio agregat dalam persen (0-100); input evaluasi scaling.
    fn load_percent(&self) -> u32;

    /// Snapshot konfigurasi.
    fn config(&self) -> BusConfig;

    /// Controller scaling milik bus ini (scaling bersifat per-bus).
    fn scaling(&self) -> &ScalingController;

    /// Hentikan aktivitas background (evaluasi scaling) sebelum destroy.
    fn shutdown(&self);
}

/// Bus multi-segment: implementasi utama.
#[derive(Debug)]
pub struct SegmentedBus {
    segments: Vec<Segment>,
    total_capacity: usize,
    origin: LanguageTag,
    // Titik mulai rotasi untuk tie-break seleksi
    rr_counter: AtomicUsize,
    total_messages: AtomicU64,
    total_bytes: AtomicU64,
    failed_writes: AtomicU64,
    failed_reads: AtomicU64,
    scaling: ScalingController,
}

impl SegmentedBus {
    /// Membuat bus dengan kapasitas total dan jumlah segment eksplisit.
    /// `segment_count == 0` memilih otomatis berdasarkan paralelisme host.
    pub fn create(
        total_capacity: usize,
        segment_count: usize,
        origin: LanguageTag,
    ) -> BusResult<Self> {
        Self::with_config(total_capacity, segment_count, origin, ScalingConfig::default())
    }

    /// Varian `create` dengan konfigurasi scaling custom.
    pub fn with_config(
        total_capacity: usize,
        segment_count: usize,
        origin: LanguageTag,
        scaling: ScalingConfig,
    ) -> BusResult<Self> {
        if total_capacity == 0 || segment_count > MAX_SEGMENTS {
            return Err(BusError::InvalidParams);
        }

        let count = if segment_count == 0 {
            auto_segment_count()
        } else {
            segment_count
        };

        let segment_capacity = align_segment_capacity(total_capacity / count);
        if segment_capacity < frame_size(1) {
            return Err(BusError::InvalidParams);
        }

        let mut segments = Vec::with_capacity(count);
        for _ in 0..count {
            segments.push(Segment::new(segment_capacity)?);
        }

        Ok(Self {
            segments,
            total_capacity: segment_capacity * count,
            origin,
            rr_counter: AtomicUsize::new(0),
            total_messages: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            failed_reads: AtomicU64::new(0),
            scaling: ScalingController::new(scaling)?,
        })
    }

    /// Runtime yang membuat bus ini.
    pub fn origin(&self) -> LanguageTag {
        self.origin
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Urutan kandidat untuk submit: fill terendah dulu, mulai dari
    /// posisi round-robin supaya tie tersebar.
    fn write_candidates(&self) -> Vec<usize> {
        let n = self.segments.len();
        let start = self.rr_counter.fetch_add(1, Ordering::Relaxed) % n;
        let mut order: Vec<usize> = (0..n).map(|i| (start + i) % n).collect();
        if self.scaling.config().auto_balance_load {
            order.sort_by_key(|&i| self.segments[i].used_bytes());
        }
        order
    }

    /// Urutan kandidat untuk drain: backlog terbesar dulu.
    fn read_candidates(&self) -> Vec<usize> {
        let n = self.segments.len();
        let start = self.rr_counter.fetch_add(1, Ordering::Relaxed) % n;
        let mut order: Vec<usize> = (0..n).map(|i| (start + i) % n).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.segments[i].pending()));
        order
    }
}

impl MessageBus for SegmentedBus {
    fn submit(&self, capsule: &Capsule) -> BusResult<()> {
        let config = self.scaling.config();

        // Staging accelerator: optimisasi murni. Gagal staging tidak
        // mengubah perilaku fungsional apapun.
        if config.prefer_accelerator && accel::probe().available {
            accel::stage_payload(capsule.payload());
        }

        let mut result = Err(BusError::BufferFull);
        for idx in self.write_candidates() {
            match self.segments[idx].try_write(
                capsule.payload(),
                capsule.type_id(),
                capsule.origin(),
            ) {
                Ok(()) => {
                    result = Ok(());
                    break;
                }
                // Segment penuh: coba kandidat berikutnya
                Err(BusError::BufferFull) => continue,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        match result {
            Ok(()) => {
                self.total_messages.fetch_add(1, Ordering::Relaxed);
                self.total_bytes
                    .fetch_add(capsule.size() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed_writes.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.scaling.tick(self.load_percent());
        result
    }

    fn drain(&self, _requester: LanguageTag) -> BusResult<Capsule> {
        let mut result = Err(BusError::BufferEmpty);
        for idx in self.read_candidates() {
            if self.segments[idx].pending() == 0 {
                // Kandidat terurut descending: sisanya pasti kosong juga
                break;
            }
            match self.segments[idx].try_read() {
                Ok(capsule) => {
                    result = Ok(capsule);
                    break;
                }
                // Reader lain keburu menghabiskan segment ini
                Err(BusError::BufferEmpty) => continue,
                Err(e) => {
                    self.failed_reads.fetch_add(1, Ordering::Relaxed);
                    result = Err(e);
                    break;
                }
            }
        }

        self.scaling.tick(self.load_percent());
        result
    }

    fn load_percent(&self) -> u32 {
        let used: usize = self.segments.iter().map(|s| s.used_bytes()).sum();
        ((used as u64 * 100) / self.total_capacity as u64) as u32
    }

    fn stats(&self) -> BusStats {
        let pending: u32 = self.segments.iter().map(|s| s.pending()).sum();
        let active = self.segments.iter().filter(|s| s.pending() > 0).count();
        BusStats {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            pending_messages: pending,
            active_segments: active as u32,
        }
    }

    fn config(&self) -> BusConfig {
        BusConfig {
            total_capacity: self.total_capacity,
            segment_count: self.segments.len(),
            segment_capacity: self.segments[0].capacity(),
            max_message_size: MAX_PAYLOAD_SIZE,
        }
    }

    fn scaling(&self) -> &ScalingController {
        &self.scaling
    }

    fn shutdown(&self) {
        self.scaling.halt();
    }
}

/// Jumlah segment default: satu per unit paralelisme host, minimal 1.
fn auto_segment_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_SEGMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(total: usize, count: usize) -> SegmentedBus {
        SegmentedBus::create(total, count, LanguageTag::Rust).unwrap()
    }

    fn capsule(payload: &[u8], type_id: u32) -> Capsule {
        Capsule::new(payload.to_vec(), type_id, LanguageTag::Rust).unwrap()
    }

    #[test]
    fn test_create_validation() {
        assert_eq!(
            SegmentedBus::create(0, 4, LanguageTag::C).unwrap_err(),
            BusError::InvalidParams
        );
        assert_eq!(
            SegmentedBus::create(1024, MAX_SEGMENTS + 1, LanguageTag::C).unwrap_err(),
            BusError::InvalidParams
        );
        // Kapasitas per segment terlalu kecil untuk satu frame
        assert_eq!(
            SegmentedBus::create(64, 8, LanguageTag::C).unwrap_err(),
            BusError::InvalidParams
        );
    }

    #[test]
    fn test_auto_segment_count() {
        let b = bus(1024 * 1024, 0);
        assert!(b.segment_count() >= 1);
        assert!(b.segment_count() <= MAX_SEGMENTS);
    }

    #[test]
    fn test_single_roundtrip() {
        let b = bus(64 * 1024, 4);
        b.submit(&capsule(b"ping", 9)).unwrap();

        let out = b.drain(LanguageTag::Rust).unwrap();
        assert_eq!(out.payload(), b"ping");
        assert_eq!(out.type_id(), 9);
        assert_eq!(out.origin(), LanguageTag::Rust);

        assert_eq!(b.drain(LanguageTag::Rust).unwrap_err(), BusError::BufferEmpty);
    }

    #[test]
    fn test_stats_on_success_only() {
        let b = bus(64 * 1024, 2);
        let msg = capsule(&[5u8; 100], 0);

        b.submit(&msg).unwrap();
        b.submit(&msg).unwrap();

        let stats = b.stats();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_bytes, 200);
        assert_eq!(stats.pending_messages, 2);
        assert_eq!(stats.failed_writes, 0);

        b.drain(LanguageTag::Rust).unwrap();
        let stats = b.stats();
        // Counter kumulatif tidak turun saat drain
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.pending_messages, 1);
    }

    #[test]
    fn test_backpressure_exhausts_all_segments() {
        let b = bus(8 * 1024, 4);
        let msg = capsule(&[1u8; 512], 0);

        let mut accepted = 0u64;
        loop {
            match b.submit(&msg) {
                Ok(()) => accepted += 1,
                Err(BusError::BufferFull) => break,
                Err(e) => panic!("unexpected: {e}"),
            }
        }
        assert!(accepted > 0);
        assert_eq!(b.stats().total_messages, accepted);
        assert!(b.stats().failed_writes >= 1);

        // Penuh tetap penuh tanpa drain
        assert_eq!(b.submit(&msg).unwrap_err(), BusError::BufferFull);

        // Setelah drain semua, jumlah pesan keluar == masuk
        let mut drained = 0u64;
        while b.drain(LanguageTag::Rust).is_ok() {
            drained += 1;
        }
        assert_eq!(drained, accepted);
    }

    #[test]
    fn test_submit_spreads_load() {
        let b = bus(64 * 1024, 4);
        let msg = capsule(&[2u8; 256], 0);
        for _ in 0..16 {
            b.submit(&msg).unwrap();
        }
        // Least-loaded-first: semua segment kebagian
        for s in &b.segments {
            assert!(s.pending() > 0, "segment tidak kebagian beban");
        }
    }

    #[test]
    fn test_drain_prefers_backlogged_segment() {
        let b = bus(64 * 1024, 2);
        // Isi langsung lewat segment supaya distribusi diketahui
        b.segments[0]
            .try_write(&[1u8; 32], 0, LanguageTag::C)
            .unwrap();
        for _ in 0..5 {
            b.segments[1]
                .try_write(&[2u8; 32], 0, LanguageTag::C)
                .unwrap();
        }

        // Drain pertama harus datang dari segment dengan backlog terbesar
        let first = b.drain(LanguageTag::Rust).unwrap();
        assert_eq!(first.payload()[0], 2);
    }

    #[test]
    fn test_no_global_fifo_across_segments() {
        // Dokumentasi perilaku: urutan global TIDAK dijamin antar segment,
        // hanya jumlah total yang harus cocok.
        let b = bus(64 * 1024, 4);
        for i in 0..20u8 {
            b.submit(&capsule(&[i], i as u32)).unwrap();
        }
        let mut seen = Vec::new();
        while let Ok(capsule) = b.drain(LanguageTag::Rust) {
            seen.push(capsule.payload()[0]);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_per_segment_fifo_preserved() {
        let b = bus(32 * 1024, 1);
        for i in 0..50u32 {
            b.submit(&capsule(&i.to_le_bytes(), 0)).unwrap();
        }
        for i in 0..50u32 {
            let capsule = b.drain(LanguageTag::Rust).unwrap();
            assert_eq!(capsule.payload(), &i.to_le_bytes());
        }
    }

    #[test]
    fn test_config_snapshot() {
        let b = bus(1024 * 1024, 8);
        let config = b.config();
        assert_eq!(config.segment_count, 8);
        assert_eq!(config.max_message_size, MAX_PAYLOAD_SIZE);
        assert_eq!(
            config.total_capacity,
            config.segment_capacity * config.segment_count
        );
    }

    #[test]
    fn test_scaling_reacts_to_fill() {
        let b = SegmentedBus::with_config(
            16 * 1024,
            2,
            LanguageTag::Rust,
            ScalingConfig {
                scale_cooldown: std::time::Duration::ZERO,
                ..ScalingConfig::default()
            },
        )
        .unwrap();

        assert_eq!(b.scaling().optimal_producer_count(), 1);

        // Isi sampai hampir penuh lalu paksa evaluasi
        let msg = capsule(&[0u8; 1024], 0);
        while b.submit(&msg).is_ok() {}
        b.scaling().evaluate(b.load_percent());
        assert!(b.scaling().optimal_producer_count() > 1);
    }
}
