//! Protocol module: frame format dan capsule.
//!
//! Prinsip desain:
//! - Flat encoding: header fixed-size yang bisa dibaca langsung dari bytes
//! - Opaque payload: bus tidak pernah menginterpretasi isi pesan
//! - Checksum murah untuk deteksi korupsi, bukan kriptografi

mod capsule;
pub(crate) mod frame;

pub use capsule::{Capsule, LanguageTag};
pub use frame::{
    align_up, checksum_fast, frame_size, FrameHeader, FRAME_ALIGN, FRAME_HEADER_SIZE, FRAME_MAGIC,
    MAX_PAYLOAD_SIZE, PADDING_MAGIC,
};
