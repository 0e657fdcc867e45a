//! Handle registry: arena ber-generation untuk handle boundary
//!
//! Pattern "opaque handle as integer": registry process-wide memegang
//! satu-satunya referensi hidup ke tiap bus; boundary tidak pernah
//! mengekspos objeknya. Handle menyimpan generation supaya handle basi
//! (sudah di-destroy, atau slot sudah dipakai bus lain) selalu ditolak
//! dengan `InvalidHandle`, bukan undefined behavior.
//!
//! Handle layout: `generation (u16) << 16 | slot_index (u16)`.
//! Generation mulai dari 1, jadi 0 tidak pernah jadi handle valid.

use std::sync::{Arc, OnceLock, RwLock};

use crate::core::MessageBus;
use crate::error::{BusError, BusResult};

/// Batas jumlah bus hidup bersamaan dalam satu proses.
pub const MAX_HANDLES: usize = 256;

struct Slot {
    generation: u16,
    bus: Option<Arc<dyn MessageBus>>,
}

/// Registry process-wide. State global dikurung di sini dengan
/// inisialisasi eksplisit idempotent dan teardown terdokumentasi
/// (`clear`), bukan lazy state yang tersebar.
pub struct Registry {
    slots: RwLock<Vec<Slot>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Daftarkan bus baru, return handle-nya. Registry penuh dilaporkan
    /// sebagai `MemoryAllocation` (tidak ada slot tersisa).
    pub fn insert(&self, bus: Arc<dyn MessageBus>) -> BusResult<u32> {
        let mut slots = self.slots.write().unwrap();

        // Reuse slot kosong dengan generation baru
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.bus.is_none() {
                slot.generation = next_generation(slot.generation);
                slot.bus = Some(bus);
                return Ok(make_handle(slot.generation, index));
            }
        }

        if slots.len() >= MAX_HANDLES {
            return Err(BusError::MemoryAllocation);
        }

        let index = slots.len();
        slots.push(Slot {
            generation: 1,
            bus: Some(bus),
        });
        Ok(make_handle(1, index))
    }

    /// Resolve handle ke bus hidup.
    pub fn get(&self, handle: u32) -> BusResult<Arc<dyn MessageBus>> {
        let (generation, index) = split_handle(handle)?;
        let slots = self.slots.read().unwrap();
        let slot = slots.get(index).ok_or(BusError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(BusError::InvalidHandle);
        }
        slot.bus.clone().ok_or(BusError::InvalidHandle)
    }

    /// Cabut bus dari registry. Panggilan kedua dengan handle yang sama
    /// adalah `InvalidHandle`, bukan crash.
    pub fn remove(&self, handle: u32) -> BusResult<Arc<dyn MessageBus>> {
        let (generation, index) = split_handle(handle)?;
        let mut slots = self.slots.write().unwrap();
        let slot = slots.get_mut(index).ok_or(BusError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(BusError::InvalidHandle);
        }
        slot.bus.take().ok_or(BusError::InvalidHandle)
    }

    /// Teardown: shutdown dan lepaskan semua bus hidup. Return jumlah
    /// yang ditutup. Idempotent.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.write().unwrap();
        let mut closed = 0;
        for slot in slots.iter_mut() {
            if let Some(bus) = slot.bus.take() {
                bus.shutdown();
                closed += 1;
            }
        }
        closed
    }

    /// Jumlah bus hidup.
    pub fn active_count(&self) -> usize {
        self.slots
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.bus.is_some())
            .count()
    }
}

/// Registry global. Inisialisasi idempotent; semua jalur FFI lewat sini.
pub fn global() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

#[inline(always)]
fn make_handle(generation: u16, index: usize) -> u32 {
    ((generation as u32) << 16) | (index as u32)
}

#[inline(always)]
fn split_handle(handle: u32) -> BusResult<(u16, usize)> {
    let generation = (handle >> 16) as u16;
    let index = (handle & 0xFFFF) as usize;
    if generation == 0 || index >= MAX_HANDLES {
        return Err(BusError::InvalidHandle);
    }
    Ok((generation, index))
}

#[inline(always)]
fn next_generation(current: u16) -> u16 {
    // Generation 0 direservasi untuk "tidak pernah valid"
    match current.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}
