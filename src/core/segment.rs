//! Segment: satu partisi ring buffer dengan bi-cursor protocol
//!
//! Setiap segment adalah bounded FIFO byte storage dengan cursor write
//! dan read yang independen. Writer dan reader boleh jalan bersamaan di
//! region yang disjoint; sesama writer (dan sesama reader) diserialisasi
//! oleh lock per sisi, bukan lock seluruh bus.
//!
//! Cursor bersifat monotonic u64; offset fisik = cursor % capacity.
//! Frame tidak pernah terpotong di wrap boundary: writer menyisipkan
//! padding frame dan reader melompatinya.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use memmap2::MmapMut;

use crate::error::{BusError, BusResult};
use crate::protocol::frame::{align_up, frame_size};
use crate::protocol::{Capsule, FrameHeader, LanguageTag, FRAME_HEADER_SIZE};

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
#[derive(Debug)]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Satu segment ring buffer.
///
/// Storage di-mmap anonim sekali saat konstruksi dan tidak pernah
/// di-realloc; hanya cursor dan counter yang bermutasi.
#[derive(Debug)]
pub struct Segment {
    // Producer cursor - cache line aligned, monotonic
    write_pos: CacheLinePadded<AtomicU64>,
    // Consumer cursor - cache line aligned, monotonic
    read_pos: CacheLinePadded<AtomicU64>,
    // Jumlah pesan (bukan padding) yang belum dibaca
    pending: AtomicU32,
    // Akuntansi kumulatif per segment
    total_written: AtomicU64,
    total_read: AtomicU64,
    // Serialisasi writer-vs-writer dan reader-vs-reader
    write_lock: Mutex<()>,
    read_lock: Mutex<()>,
    // Window storage; ptr diambil sekali, mapping hidup selama segment
    ptr: *mut u8,
    capacity: usize,
    _storage: MmapMut,
}

// SAFETY: Segment aman untuk Send/Sync karena:
// - Bytes di [read_pos % cap, write_pos % cap) hanya dibaca oleh reader,
//   bytes bebas hanya ditulis oleh writer
// - write_lock menserialisasi semua penulis, read_lock semua pembaca
// - Publikasi data memakai store Release pada cursor, konsumsi memakai
//   load Acquire, jadi isi frame selalu visible sebelum cursor maju
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Membuat segment dengan kapasitas tetap.
    ///
    /// Kapasitas harus kelipatan FRAME_ALIGN dan cukup untuk minimal
    /// satu frame terkecil; di luar itu `InvalidParams`.
    pub fn new(capacity: usize) -> BusResult<Self> {
        if capacity == 0
            || capacity % crate::protocol::FRAME_ALIGN != 0
            || capacity < frame_size(1)
        {
            return Err(BusError::InvalidParams);
        }

        let mut storage = MmapMut::map_anon(capacity).map_err(|_| BusError::MemoryAllocation)?;
        let ptr = storage.as_mut_ptr();

        Ok(Self {
            write_pos: CacheLinePadded::new(AtomicU64::new(0)),
            read_pos: CacheLinePadded::new(AtomicU64::new(0)),
            pending: AtomicU32::new(0),
            total_written: AtomicU64::new(0),
            total_read: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            read_lock: Mutex::new(()),
            ptr,
            capacity,
            _storage: storage,
        })
    }

    /// Tulis satu pesan sebagai frame length-prefixed.
    ///
    /// Non-blocking: segment penuh langsung return `BufferFull` supaya
    /// bus bisa retry di segment lain. Pesan yang tidak mungkin muat
    /// bahkan saat kosong adalah `InvalidParams`.
    pub fn try_write(&self, payload: &[u8], type_id: u32, origin: LanguageTag) -> BusResult<()> {
        let need = frame_size(payload.len());
        if payload.is_empty() || FRAME_HEADER_SIZE + payload.len() > self.capacity {
            return Err(BusError::InvalidParams);
        }

        let _guard = self.write_lock.lock().unwrap();

        let mut write = self.write_pos.value.load(Ordering::Relaxed);
        let read = self.read_pos.value.load(Ordering::Acquire);
        let used = (write - read) as usize;
        let free = self.capacity - used;

        let mut offset = (write % self.capacity as u64) as usize;
        let mut rem = self.capacity - offset;

        // Frame harus contiguous. Kalau sisa sampai akhir ring tidak cukup,
        // area itu dipad dan write pindah ke offset 0.
        if rem < need {
            if used == 0 {
                // Segment kosong: realign kedua cursor ke batas ring supaya
                // pesan besar tidak terjebak oleh posisi wrap yang sial.
                let _rg = self.read_lock.lock().unwrap();
                if self.read_pos.value.load(Ordering::Relaxed) == write {
                    let cap = self.capacity as u64;
                    let aligned = (write + cap - 1) / cap * cap;
                    self.write_pos.value.store(aligned, Ordering::Relaxed);
                    self.read_pos.value.store(aligned, Ordering::Release);
                    write = aligned;
                    offset = 0;
                    rem = self.capacity;
                }
            }

            if rem < need {
                if free < rem + need {
                    return Err(BusError::BufferFull);
                }
                if rem >= FRAME_HEADER_SIZE {
                    let pad = FrameHeader::padding((rem - FRAME_HEADER_SIZE) as u32);
                    // SAFETY: region [offset, offset+24) bebas (di luar live
                    // data) dan eksklusif milik writer di bawah write_lock
                    unsafe { self.copy_in(offset, &pad.to_bytes()) };
                }
                // rem < FRAME_HEADER_SIZE dilompati implisit; reader memakai
                // aturan deterministik yang sama
                write += rem as u64;
                offset = 0;
            }
        } else if free < need {
            return Err(BusError::BufferFull);
        }

        let header = FrameHeader::new(payload, type_id, origin);
        // SAFETY: [offset, offset+need) bebas; writer tunggal di bawah lock
        unsafe {
            self.copy_in(offset, &header.to_bytes());
            self.copy_in(offset + FRAME_HEADER_SIZE, payload);
        }

        // pending naik SEBELUM cursor dipublikasikan. Reader hanya gate
        // di cursor, jadi over-count sesaat aman; urutan sebaliknya
        // membiarkan fetch_sub reader mendahului dan wrap ke bawah nol.
        self.pending.fetch_add(1, Ordering::AcqRel);
        // Release: isi frame harus visible sebelum cursor maju
        self.write_pos
            .value
            .store(write + need as u64, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Baca satu pesan tertua sebagai copy yang dimiliki caller.
    ///
    /// `BufferEmpty` kalau tidak ada pesan. `CorruptedData` hanya muncul
    /// kalau ada bug sinkronisasi - bukan jalur yang boleh di-retry.
    pub fn try_read(&self) -> BusResult<Capsule> {
        let _guard = self.read_lock.lock().unwrap();

        loop {
            let read = self.read_pos.value.load(Ordering::Relaxed);
            let write = self.write_pos.value.load(Ordering::Acquire);
            if read == write {
                return Err(BusError::BufferEmpty);
            }

            let offset = (read % self.capacity as u64) as usize;
            let rem = self.capacity - offset;

            // Sisa terlalu kecil untuk header: skip implisit (aturan yang
            // sama dengan writer)
            if rem < FRAME_HEADER_SIZE {
                self.read_pos
                    .value
                    .store(read + rem as u64, Ordering::Release);
                continue;
            }

            let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
            // SAFETY: [offset, offset+24) berada dalam live data milik reader
            unsafe { self.copy_out(offset, &mut header_bytes) };
            let header = match FrameHeader::from_bytes(&header_bytes) {
                Some(h) if h.is_valid() => h,
                _ => return Err(BusError::CorruptedData),
            };

            if header.is_padding() {
                let skip = (FRAME_HEADER_SIZE + header.len as usize) as u64;
                if read + skip > write {
                    return Err(BusError::CorruptedData);
                }
                self.read_pos.value.store(read + skip, Ordering::Release);
                continue;
            }

            let total = frame_size(header.len as usize);
            // Length prefix yang mengimplikasikan read melewati write_pos
            // berarti storage korup
            if read + total as u64 > write {
                return Err(BusError::CorruptedData);
            }

            let mut payload = vec![0u8; header.len as usize];
            // SAFETY: payload frame berada dalam live data milik reader
            unsafe { self.copy_out(offset + FRAME_HEADER_SIZE, &mut payload) };

            if crate::protocol::checksum_fast(&payload) != header.checksum {
                return Err(BusError::CorruptedData);
            }

            self.read_pos
                .value
                .store(read + total as u64, Ordering::Release);
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.total_read.fetch_add(1, Ordering::Relaxed);

            let capsule = Capsule::new(
                payload,
                header.type_id,
                LanguageTag::from_i32(header.origin),
            )?;
            return Ok(capsule);
        }
    }

    /// Jumlah pesan yang belum dibaca di segment ini.
    #[inline(always)]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// Bytes yang sedang terpakai (termasuk padding frame).
    ///
    /// Snapshot tanpa lock: read dimuat lebih dulu. Karena read tidak
    /// pernah melewati write, urutan ini menjamin selisihnya non-negatif
    /// meski kedua cursor maju di antara dua load.
    #[inline(always)]
    pub fn used_bytes(&self) -> usize {
        let read = self.read_pos.value.load(Ordering::Acquire);
        let write = self.write_pos.value.load(Ordering::Acquire);
        (write - read) as usize
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Total pesan yang pernah ditulis ke segment ini.
    #[inline(always)]
    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Total pesan yang pernah dibaca dari segment ini.
    #[inline(always)]
    pub fn total_read(&self) -> u64 {
        self.total_read.load(Ordering::Relaxed)
    }

    /// Copy ke storage. Caller menjamin region bebas dan dalam bounds.
    #[inline(always)]
    unsafe fn copy_in(&self, offset: usize, src: &[u8]) {
        debug_assert!(offset + src.len() <= self.capacity);
        std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), src.len());
    }

    /// Copy dari storage. Caller menjamin region live dan dalam bounds.
    #[inline(always)]
    unsafe fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        debug_assert!(offset + dst.len() <= self.capacity);
        std::ptr::copy_nonoverlapping(self.ptr.add(offset), dst.as_mut_ptr(), dst.len());
    }
}

/// Align kapasitas segment ke bawah ke kelipatan FRAME_ALIGN.
pub(crate) fn align_segment_capacity(raw: usize) -> usize {
    let aligned = align_up(raw);
    if aligned > raw {
        aligned - crate::protocol::FRAME_ALIGN
    } else {
        aligned
    }
}
