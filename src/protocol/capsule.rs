//! Capsule: unit pesan opaque yang bergerak lewat bus.

use crate::error::{BusError, BusResult};
use crate::protocol::frame::MAX_PAYLOAD_SIZE;

/// Tag runtime asal pesan. Nilai numerik stabil di boundary FFI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageTag {
    C = 0,
    Cpp = 1,
    Python = 2,
    Javascript = 3,
    Rust = 4,
    Go = 5,
    Java = 6,
    CSharp = 7,
    Kotlin = 8,
    Swift = 9,
    /// Tag tak dikenal dari binding lama atau eksperimental.
    Unknown = -1,
}

impl LanguageTag {
    /// Konversi dari integer boundary. Nilai di luar range jatuh ke Unknown,
    /// bukan error: origin tag hanya metadata, tidak pernah menggagalkan operasi.
    #[inline(always)]
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => Self::C,
            1 => Self::Cpp,
            2 => Self::Python,
            3 => Self::Javascript,
            4 => Self::Rust,
            5 => Self::Go,
            6 => Self::Java,
            7 => Self::CSharp,
            8 => Self::Kotlin,
            9 => Self::Swift,
            _ => Self::Unknown,
        }
    }
}

/// Satu unit pesan: payload bytes + metadata.
///
/// Immutable setelah dibuat. Bus tidak pernah membaca isi `payload`,
/// hanya memindahkan dan menghitung bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    payload: Vec<u8>,
    type_id: u32,
    origin: LanguageTag,
}

impl Capsule {
    /// Membuat capsule baru. Payload kosong atau lebih dari 64KB adalah
    /// error caller (`InvalidParams`), bukan truncation diam-diam.
    pub fn new(payload: Vec<u8>, type_id: u32, origin: LanguageTag) -> BusResult<Self> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD_SIZE {
            return Err(BusError::InvalidParams);
        }
        Ok(Self {
            payload,
            type_id,
            origin,
        })
    }

    #[inline(always)]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    #[inline(always)]
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    #[inline(always)]
    pub fn origin(&self) -> LanguageTag {
        self.origin
    }

    /// Ambil ownership payload (dipakai boundary layer saat handoff ke caller).
    #[inline(always)]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
