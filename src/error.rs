//! Error bus dan pemetaan kode numerik untuk boundary C.
//!
//! Setiap varian punya kode i32 negatif yang stabil; 0 selalu berarti
//! sukses. Kode ini adalah kontrak ABI, jangan diubah urutannya.

use std::ffi::CStr;

use thiserror::Error;

/// Kode sukses di boundary C.
pub const CODE_SUCCESS: i32 = 0;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// Argumen di luar rentang valid (payload kosong, kapasitas 0, dll)
    #[error("invalid parameters")]
    InvalidParams,

    /// Tidak ada segment yang bisa menerima pesan; caller harus backoff
    #[error("buffer full")]
    BufferFull,

    /// Tidak ada pesan pending di bus
    #[error("buffer empty")]
    BufferEmpty,

    /// Handle tidak dikenal, sudah di-destroy, atau basi
    #[error("invalid handle")]
    InvalidHandle,

    /// Alokasi storage gagal atau registry penuh
    #[error("memory allocation failed")]
    MemoryAllocation,

    /// Frame di ring tidak lolos validasi (magic/checksum/ukuran)
    #[error("corrupted data")]
    CorruptedData,
}

impl BusError {
    /// Kode numerik untuk boundary C.
    #[inline]
    pub const fn code(self) -> i32 {
        match self {
            BusError::InvalidParams => -1,
            BusError::BufferFull => -2,
            BusError::BufferEmpty => -3,
            BusError::InvalidHandle => -4,
            BusError::MemoryAllocation => -5,
            BusError::CorruptedData => -6,
        }
    }

    /// Kebalikan dari `code`. Kode tak dikenal jatuh ke `InvalidParams`.
    pub const fn from_code(code: i32) -> Option<BusError> {
        match code {
            -1 => Some(BusError::InvalidParams),
            -2 => Some(BusError::BufferFull),
            -3 => Some(BusError::BufferEmpty),
            -4 => Some(BusError::InvalidHandle),
            -5 => Some(BusError::MemoryAllocation),
            -6 => Some(BusError::CorruptedData),
            _ => None,
        }
    }

    /// Deskripsi NUL-terminated dengan lifetime 'static, aman dikembalikan
    /// lewat boundary C tanpa alokasi.
    pub fn as_cstr(self) -> &'static CStr {
        let bytes: &'static [u8] = match self {
            BusError::InvalidParams => b"invalid parameters\0",
            BusError::BufferFull => b"buffer full\0",
            BusError::BufferEmpty => b"buffer empty\0",
            BusError::InvalidHandle => b"invalid handle\0",
            BusError::MemoryAllocation => b"memory allocation failed\0",
            BusError::CorruptedData => b"corrupted data\0",
        };
        // SAFETY: semua literal di atas NUL-terminated dan tanpa NUL internal
        unsafe { CStr::from_bytes_with_nul_unchecked(bytes) }
    }
}
