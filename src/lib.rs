//! # Iris - Cross-Language Shared-Memory Message Bus
//!
//! Bus pesan in-process berbasis ring buffer multi-segment, dirancang
//! untuk pertukaran pesan antar runtime bahasa lewat boundary C flat.
//!
//! ## Arsitektur
//!
//! ```text
//! binding (C/Python/JS/...) -> ffi -> MessageBus -> Segment ring x N
//!                                        |
//!                                 ScalingController
//! ```
//!
//! - **protocol**: format frame on-ring (header 24 byte + checksum) dan
//!   capsule (unit pesan opaque).
//! - **core**: segment ring buffer, bus multi-segment, mock fallback,
//!   dan controller auto-scaling.
//! - **accel**: probe compute accelerator opsional (feature `gpu`).
//! - **ffi**: boundary C dengan handle registry ber-generation.
//!
//! ## Contoh
//!
//! ```
//! use iris::{Capsule, LanguageTag, MessageBus, SegmentedBus};
//!
//! let bus = SegmentedBus::create(1024 * 1024, 4, LanguageTag::Rust).unwrap();
//! let msg = Capsule::new(b"hello".to_vec(), 7, LanguageTag::Rust).unwrap();
//!
//! bus.submit(&msg).unwrap();
//! let out = bus.drain(LanguageTag::Rust).unwrap();
//! assert_eq!(out.payload(), b"hello");
//! ```

pub mod accel;
pub mod core;
pub mod error;
pub mod ffi;
pub mod protocol;

pub use crate::core::{
    BusConfig, BusStats, MessageBus, MockBus, ScalingConfig, ScalingController, SegmentedBus,
    MAX_SEGMENTS,
};
pub use crate::error::{BusError, BusResult, CODE_SUCCESS};
pub use crate::protocol::{Capsule, LanguageTag, MAX_PAYLOAD_SIZE};

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;
