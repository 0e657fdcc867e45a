//! Frame Format untuk storage dalam segment
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ FrameHeader (24 bytes, fixed)                       │
//! ├─────────────────────────────────────────────────────┤
//! │ Payload (variable, max 64KB)                        │
//! └─────────────────────────────────────────────────────┘
//!
//! Setiap frame di-align ke 8 bytes di dalam ring. Frame dengan
//! `PADDING_MAGIC` adalah filler wrap-around: reader melompatinya
//! tanpa menghitungnya sebagai pesan.

use crate::protocol::LanguageTag;

/// Magic number untuk frame pesan valid ("IRIS")
pub const FRAME_MAGIC: u32 = 0x49524953;
/// Magic number untuk padding frame di wrap boundary ("IPAD")
pub const PADDING_MAGIC: u32 = 0x49504144;
/// Maksimum payload per pesan: 64KB, kontrak boundary lintas bahasa
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;
/// Alignment frame di dalam ring
pub const FRAME_ALIGN: usize = 8;

/// Frame Header - Fixed 24 bytes
///
/// Dibaca/ditulis langsung dari storage segment tanpa parsing field-per-field.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Magic number untuk validasi (FRAME_MAGIC atau PADDING_MAGIC)
    pub magic: u32,
    /// Panjang payload dalam bytes (untuk padding: panjang area yang dilompati)
    pub len: u32,
    /// Type tag milik caller, tidak diinterpretasi oleh bus
    pub type_id: u32,
    /// Runtime asal pesan
    pub origin: i32,
    /// Checksum payload
    pub checksum: u32,
    /// Reserved untuk future use
    pub flags: u32,
}

pub const FRAME_HEADER_SIZE: usize = std::mem::size_of::<FrameHeader>();

impl FrameHeader {
    /// Header untuk frame pesan.
    #[inline(always)]
    pub fn new(payload: &[u8], type_id: u32, origin: LanguageTag) -> Self {
        Self {
            magic: FRAME_MAGIC,
            len: payload.len() as u32,
            type_id,
            origin: origin as i32,
            checksum: checksum_fast(payload),
            flags: 0,
        }
    }

    /// Header untuk padding wrap-around yang menutup `skip` bytes
    /// setelah header ini.
    #[inline(always)]
    pub fn padding(skip: u32) -> Self {
        Self {
            magic: PADDING_MAGIC,
            len: skip,
            type_id: 0,
            origin: LanguageTag::Unknown as i32,
            checksum: 0,
            flags: 0,
        }
    }

    #[inline(always)]
    pub fn is_message(&self) -> bool {
        self.magic == FRAME_MAGIC
    }

    #[inline(always)]
    pub fn is_padding(&self) -> bool {
        self.magic == PADDING_MAGIC
    }

    /// Validasi konsistensi internal. Header yang gagal di sini berarti
    /// storage segment korup.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        match self.magic {
            FRAME_MAGIC => (self.len as usize) <= MAX_PAYLOAD_SIZE && self.len > 0,
            PADDING_MAGIC => true,
            _ => false,
        }
    }

    /// Serialize ke bytes (copy, layout `repr(C)` stabil).
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.len.to_le_bytes());
        out[8..12].copy_from_slice(&self.type_id.to_le_bytes());
        out[12..16].copy_from_slice(&self.origin.to_le_bytes());
        out[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        out[20..24].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Parse dari bytes. Returns None jika buffer terlalu pendek.
    #[inline(always)]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }
        Some(Self {
            magic: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            len: u32::from_le_bytes(buf[4..8].try_into().ok()?),
            type_id: u32::from_le_bytes(buf[8..12].try_into().ok()?),
            origin: i32::from_le_bytes(buf[12..16].try_into().ok()?),
            checksum: u32::from_le_bytes(buf[16..20].try_into().ok()?),
            flags: u32::from_le_bytes(buf[20..24].try_into().ok()?),
        })
    }
}

/// Ukuran frame pesan (header + payload) setelah alignment.
#[inline(always)]
pub const fn frame_size(payload_len: usize) -> usize {
    align_up(FRAME_HEADER_SIZE + payload_len)
}

/// Align ke atas ke kelipatan FRAME_ALIGN.
#[inline(always)]
pub const fn align_up(size: usize) -> usize {
    (size + FRAME_ALIGN - 1) & !(FRAME_ALIGN - 1)
}

/// Checksum cepat (Adler variant) untuk deteksi korupsi.
#[inline(always)]
pub fn checksum_fast(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for &byte in data {
        a = a.wrapping_add(byte as u32);
        b = b.wrapping_add(a);
    }

    (b << 16) | (a & 0xFFFF)
}
