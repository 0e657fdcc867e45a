//! Auto-Scaling Controller untuk jumlah producer/consumer
//!
//! Controller ini hanya MEREKOMENDASIKAN jumlah execution unit; dia tidak
//! pernah spawn thread sendiri. Host runtime membaca
//! `optimal_producer_count()` / `optimal_consumer_count()` untuk menyusun
//! worker pool-nya.
//!
//! State machine: Idle -> Evaluating -> (Cooldown | Idle). Setiap
//! perubahan count masuk Cooldown selama `scale_cooldown` supaya tidak
//! flapping.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{BusError, BusResult};

/// Evaluasi dilakukan setiap sekian operasi bus (submit/drain).
const TICK_INTERVAL_OPS: u32 = 64;

/// Konfigurasi auto-scaling per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingConfig {
    pub min_producers: u32,
    pub max_producers: u32,
    pub min_consumers: u32,
    pub max_consumers: u32,
    /// Load (persen fill) di mana pool diperbesar.
    pub scale_threshold_percent: u32,
    /// Jeda minimum antar perubahan count.
    pub scale_cooldown: Duration,
    /// Staging lewat accelerator untuk payload besar.
    pub prefer_accelerator: bool,
    /// Pilih segment berdasarkan beban, bukan round-robin murni.
    pub auto_balance_load: bool,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_producers: 1,
            max_producers: 16,
            min_consumers: 1,
            max_consumers: 8,
            scale_threshold_percent: 75,
            scale_cooldown: Duration::from_millis(1000),
            prefer_accelerator: false,
            auto_balance_load: true,
        }
    }
}

impl ScalingConfig {
    /// Validasi bound. `min > max` atau threshold di atas 100 adalah
    /// kesalahan konfigurasi caller.
    pub fn validate(&self) -> BusResult<()> {
        if self.min_producers == 0
            || self.min_consumers == 0
            || self.min_producers > self.max_producers
            || self.min_consumers > self.max_consumers
            || self.scale_threshold_percent > 100
        {
            return Err(BusError::InvalidParams);
        }
        Ok(())
    }
}

/// Fase controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Evaluating,
    Cooldown,
}

#[derive(Debug)]
struct Inner {
    config: ScalingConfig,
    phase: Phase,
    last_change: Instant,
}

/// Controller per bus.
///
/// Count yang dipublikasikan disimpan di atomic terpisah supaya query
/// read-only tidak pernah menyentuh lock.
#[derive(Debug)]
pub struct ScalingController {
    inner: Mutex<Inner>,
    producers: AtomicU32,
    consumers: AtomicU32,
    op_counter: AtomicU32,
    halted: AtomicBool,
}

impl ScalingController {
    pub fn new(config: ScalingConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self {
            producers: AtomicU32::new(config.min_producers),
            consumers: AtomicU32::new(config.min_consumers),
            inner: Mutex::new(Inner {
                config,
                phase: Phase::Idle,
                last_change: Instant::now(),
            }),
            op_counter: AtomicU32::new(0),
            halted: AtomicBool::new(false),
        })
    }

    /// Ganti konfigurasi. Count yang sedang dipublikasikan di-clamp ke
    /// bound baru.
    pub fn reconfigure(&self, config: ScalingConfig) -> BusResult<()> {
        config.validate()?;
        let mut inner = self.inner.lock().unwrap();
        inner.config = config;
        let p = self.producers.load(Ordering::Relaxed);
        let c = self.consumers.load(Ordering::Relaxed);
        self.producers.store(
            p.clamp(config.min_producers, config.max_producers),
            Ordering::Relaxed,
        );
        self.consumers.store(
            c.clamp(config.min_consumers, config.max_consumers),
            Ordering::Relaxed,
        );
        Ok(())
    }

    pub fn config(&self) -> ScalingConfig {
        self.inner.lock().unwrap().config
    }

    /// Rekomendasi jumlah producer saat ini. Read-only, lock-free.
    #[inline(always)]
    pub fn optimal_producer_count(&self) -> u32 {
        self.producers.load(Ordering::Acquire)
    }

    /// Rekomendasi jumlah consumer saat ini. Read-only, lock-free.
    #[inline(always)]
    pub fn optimal_consumer_count(&self) -> u32 {
        self.consumers.load(Ordering::Acquire)
    }

    /// Dipanggil bus di setiap submit/drain; evaluasi hanya jalan sekali
    /// per TICK_INTERVAL_OPS operasi.
    #[inline(always)]
    pub fn tick(&self, load_percent: u32) {
        let ops = self.op_counter.fetch_add(1, Ordering::Relaxed);
        if ops % TICK_INTERVAL_OPS == 0 {
            self.evaluate(load_percent);
        }
    }

    /// Evaluasi eksplisit (dipakai boundary `trigger_scale_evaluation`).
    pub fn evaluate(&self, load_percent: u32) {
        if self.halted.load(Ordering::Acquire) {
            return;
        }

        let mut inner = self.inner.lock().unwrap();

        // Cooldown aktif: tidak ada perubahan sampai jeda habis
        if inner.phase == Phase::Cooldown {
            if inner.last_change.elapsed() < inner.config.scale_cooldown {
                return;
            }
            inner.phase = Phase::Idle;
        }

        inner.phase = Phase::Evaluating;
        let config = inner.config;
        let mut changed = false;

        if load_percent >= config.scale_threshold_percent {
            // Load tinggi: perbesar pool, double capped di max
            changed |= grow(&self.producers, config.max_producers);
            changed |= grow(&self.consumers, config.max_consumers);
        } else if load_percent < config.scale_threshold_percent / 2 {
            // Hysteresis band: baru mengecil kalau load jauh di bawah threshold
            changed |= shrink(&self.producers, config.min_producers);
            changed |= shrink(&self.consumers, config.min_consumers);
        }

        if changed {
            inner.phase = Phase::Cooldown;
            inner.last_change = Instant::now();
        } else {
            inner.phase = Phase::Idle;
        }
    }

    /// Hentikan evaluasi secara permanen. Dipanggil sebelum bus destroy
    /// supaya tidak ada scaling yang jalan saat teardown.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }
}

fn grow(count: &AtomicU32, max: u32) -> bool {
    let current = count.load(Ordering::Relaxed);
    if current >= max {
        return false;
    }
    let next = (current * 2).min(max);
    count.store(next, Ordering::Release);
    true
}

fn shrink(count: &AtomicU32, min: u32) -> bool {
    let current = count.load(Ordering::Relaxed);
    if current <= min {
        return false;
    }
    let next = (current / 2).max(min);
    count.store(next, Ordering::Release);
    true
}
