//! Core module: Multi-Segment Ring Bus
//!
//! Prinsip desain:
//! - Storage tetap: kapasitas fix saat create, tidak pernah realloc
//! - Kontensi lokal: sinkronisasi per segment, bukan per bus
//! - Non-blocking: semua operasi selesai dalam waktu terbatas,
//!   backoff adalah urusan caller

mod bus;
mod mock;
mod scaling;
mod segment;

pub use bus::{BusConfig, BusStats, MessageBus, SegmentedBus, MAX_SEGMENTS};
pub use mock::MockBus;
pub use scaling::{ScalingConfig, ScalingController};
pub use segment::Segment;
