//! MockBus: engine fallback untuk development
//!
//! Implementasi `MessageBus` yang sama persis kontraknya dengan
//! `SegmentedBus` tapi disimpan di queue biasa. Dipakai binding saat
//! engine native belum tersedia, dan test yang tidak butuh ring storage.
//! Dipilih saat startup sebagai varian polimorfik - call site tidak
//! pernah branch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::core::bus::{BusConfig, BusStats, MessageBus};
use crate::core::scaling::{ScalingConfig, ScalingController};
use crate::error::{BusError, BusResult};
use crate::protocol::frame::frame_size;
use crate::protocol::{Capsule, LanguageTag, MAX_PAYLOAD_SIZE};

/// Bus berbasis queue tunggal. Kapasitas dihitung dalam bytes frame
/// supaya backpressure-nya sebanding dengan engine asli.
#[derive(Debug)]
pub struct MockBus {
    queue: Mutex<MockQueue>,
    total_capacity: usize,
    total_messages: AtomicU64,
    total_bytes: AtomicU64,
    failed_writes: AtomicU64,
    scaling: ScalingController,
}

#[derive(Debug)]
struct MockQueue {
    items: VecDeque<Capsule>,
    used_bytes: usize,
}

impl MockBus {
    pub fn create(total_capacity: usize, _origin: LanguageTag) -> BusResult<Self> {
        if total_capacity == 0 || total_capacity < frame_size(1) {
            return Err(BusError::InvalidParams);
        }
        Ok(Self {
            queue: Mutex::new(MockQueue {
                items: VecDeque::new(),
                used_bytes: 0,
            }),
            total_capacity,
            total_messages: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            scaling: ScalingController::new(ScalingConfig::default())?,
        })
    }

}

impl MessageBus for MockBus {
    fn load_percent(&self) -> u32 {
        let used = self.queue.lock().unwrap().used_bytes;
        ((used as u64 * 100) / self.total_capacity as u64) as u32
    }

    fn submit(&self, capsule: &Capsule) -> BusResult<()> {
        let need = frame_size(capsule.size());

        let result = {
            let mut queue = self.queue.lock().unwrap();
            if queue.used_bytes + need > self.total_capacity {
                Err(BusError::BufferFull)
            } else {
                queue.items.push_back(capsule.clone());
                queue.used_bytes += need;
                Ok(())
            }
        };

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
        let result = {
            let mut queue = self.queue.lock().unwrap();
            match queue.items.pop_front() {
                Some(capsule) => {
                    queue.used_bytes -= frame_size(capsule.size());
                    Ok(capsule)
                }
                None => Err(BusError::BufferEmpty),
            }
        };

        self.scaling.tick(self.load_percent());
        result
    }

    fn stats(&self) -> BusStats {
        let queue = self.queue.lock().unwrap();
        BusStats {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            failed_reads: 0,
            pending_messages: queue.items.len() as u32,
            active_segments: u32::from(!queue.items.is_empty()),
        }
    }

    fn config(&self) -> BusConfig {
        BusConfig {
            total_capacity: self.total_capacity,
            segment_count: 1,
            segment_capacity: self.total_capacity,
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
