//! Boundary C flat untuk binding lintas bahasa.
//!
//! Konvensi ABI:
//! - Semua handle adalah `u32`; 0 tidak pernah valid.
//! - Fungsi yang return kode: 0 sukses, negatif adalah kode `BusError`.
//! - Pointer yang dikembalikan `iris_drain` WAJIB dilepas lewat
//!   `iris_capsule_free`, bukan `free()` milik caller.
//! - Tidak ada fungsi di sini yang panik ke seberang boundary: semua
//!   jalur error berakhir di kode numerik atau nilai sentinel.
//!
//! Dua lapis API:
//! 1. Capsule ABI (`iris_create`, `iris_submit`, `iris_drain`): metadata
//!    lengkap, ownership eksplisit.
//! 2. Simple byte ABI (`iris_create_buffer`, `iris_write_message`,
//!    `iris_read_message`): cukup untuk binding minimal yang hanya
//!    memindahkan bytes.

mod registry;

pub use registry::MAX_HANDLES;

use std::collections::HashMap;
use std::ffi::c_char;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::accel;
use crate::core::{MessageBus, MockBus, ScalingConfig, SegmentedBus};
use crate::error::{BusError, CODE_SUCCESS};
use crate::protocol::{Capsule, LanguageTag, MAX_PAYLOAD_SIZE};

/// Batas `size_mb` untuk `iris_create_buffer`.
const MIN_BUFFER_MB: u32 = 1;
const MAX_BUFFER_MB: u32 = 64;

/// Jumlah segment default untuk simple byte ABI.
const DEFAULT_SEGMENT_COUNT: usize = 8;

/// Representasi capsule di boundary C.
///
/// `data` menunjuk buffer sepanjang `size` bytes yang dimiliki library
/// (hasil `iris_drain`) atau caller (argumen `iris_submit`).
#[repr(C)]
pub struct IrisCapsule {
    pub data: *mut u8,
    pub size: usize,
    pub type_id: u32,
    pub origin: i32,
}

/// Konfigurasi scaling di boundary C. Mirror `ScalingConfig` dengan
/// durasi dalam milidetik.
#[repr(C)]
pub struct IrisScalingConfig {
    pub min_producers: u32,
    pub max_producers: u32,
    pub min_consumers: u32,
    pub max_consumers: u32,
    pub scale_threshold_percent: u32,
    pub scale_cooldown_ms: u32,
    pub prefer_accelerator: bool,
    pub auto_balance_load: bool,
}

impl From<&IrisScalingConfig> for ScalingConfig {
    fn from(c: &IrisScalingConfig) -> Self {
        ScalingConfig {
            min_producers: c.min_producers,
            max_producers: c.max_producers,
            min_consumers: c.min_consumers,
            max_consumers: c.max_consumers,
            scale_threshold_percent: c.scale_threshold_percent,
            scale_cooldown: Duration::from_millis(c.scale_cooldown_ms as u64),
            prefer_accelerator: c.prefer_accelerator,
            auto_balance_load: c.auto_balance_load,
        }
    }
}

/// Pushback slot per handle: pesan yang sudah di-drain tapi belum muat
/// di buffer caller diparkir di sini, bukan di-submit ulang ke bus.
/// Drain berikutnya (byte ABI maupun capsule ABI) mengembalikan pesan
/// ini lebih dulu, jadi pesan tidak pernah hilang atau kehilangan giliran
/// meski bus keburu penuh lagi.
fn pushback() -> &'static Mutex<HashMap<u32, Capsule>> {
    static PUSHBACK: OnceLock<Mutex<HashMap<u32, Capsule>>> = OnceLock::new();
    PUSHBACK.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Kemampuan accelerator di boundary C.
#[repr(C)]
pub struct IrisAcceleratorCaps {
    pub available: bool,
    pub memory_size: u64,
    pub compute_capability: u32,
    pub max_parallel_units: u32,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Inisialisasi library. Idempotent; aman dipanggil berkali-kali.
#[no_mangle]
pub extern "C" fn iris_init() -> i32 {
    registry::global();
    CODE_SUCCESS
}

/// Teardown: shutdown dan lepaskan semua bus hidup. Semua handle lama
/// jadi invalid. Idempotent.
#[no_mangle]
pub extern "C" fn iris_shutdown() -> i32 {
    registry::global().clear();
    pushback().lock().unwrap().clear();
    CODE_SUCCESS
}

/// Membuat bus multi-segment. `segment_count == 0` memilih otomatis.
/// Return handle, atau 0 kalau gagal.
#[no_mangle]
pub extern "C" fn iris_create(total_capacity: usize, segment_count: u32, origin: i32) -> u32 {
    let bus = match SegmentedBus::create(
        total_capacity,
        segment_count as usize,
        LanguageTag::from_i32(origin),
    ) {
        Ok(bus) => bus,
        Err(_) => return 0,
    };
    register(Arc::new(bus))
}

/// Membuat bus mock (engine fallback berbasis queue). Kontrak sama
/// dengan `iris_create`.
#[no_mangle]
pub extern "C" fn iris_create_mock(total_capacity: usize, origin: i32) -> u32 {
    let bus = match MockBus::create(total_capacity, LanguageTag::from_i32(origin)) {
        Ok(bus) => bus,
        Err(_) => return 0,
    };
    register(Arc::new(bus))
}

/// Destroy bus. Handle tidak valid lagi setelah return; destroy kedua
/// dengan handle yang sama mengembalikan `InvalidHandle`.
#[no_mangle]
pub extern "C" fn iris_destroy(handle: u32) -> i32 {
    match registry::global().remove(handle) {
        Ok(bus) => {
            bus.shutdown();
            pushback().lock().unwrap().remove(&handle);
            CODE_SUCCESS
        }
        Err(e) => e.code(),
    }
}

// ---------------------------------------------------------------------------
// Capsule ABI
// ---------------------------------------------------------------------------

/// Submit satu capsule. Payload di-copy; buffer caller tetap milik caller.
///
/// # Safety
/// `capsule` harus null atau menunjuk `IrisCapsule` valid dengan `data`
/// menunjuk minimal `size` bytes yang bisa dibaca.
#[no_mangle]
pub unsafe extern "C" fn iris_submit(handle: u32, capsule: *const IrisCapsule) -> i32 {
    if capsule.is_null() {
        return BusError::InvalidParams.code();
    }
    let c = &*capsule;
    if c.data.is_null() {
        return BusError::InvalidParams.code();
    }

    let bus = match registry::global().get(handle) {
        Ok(bus) => bus,
        Err(e) => return e.code(),
    };

    let payload = std::slice::from_raw_parts(c.data, c.size).to_vec();
    let message = match Capsule::new(payload, c.type_id, LanguageTag::from_i32(c.origin)) {
        Ok(message) => message,
        Err(e) => return e.code(),
    };

    match bus.submit(&message) {
        Ok(()) => CODE_SUCCESS,
        Err(e) => e.code(),
    }
}

/// Drain satu capsule. Return pointer milik library (lepas dengan
/// `iris_capsule_free`), atau null kalau bus kosong atau handle invalid.
#[no_mangle]
pub extern "C" fn iris_drain(handle: u32, requester: i32) -> *mut IrisCapsule {
    let bus = match registry::global().get(handle) {
        Ok(bus) => bus,
        Err(_) => return std::ptr::null_mut(),
    };
    // Pesan yang diparkir iris_read_message punya giliran pertama
    let parked = pushback().lock().unwrap().remove(&handle);
    let capsule = match parked {
        Some(capsule) => capsule,
        None => match bus.drain(LanguageTag::from_i32(requester)) {
            Ok(capsule) => capsule,
            Err(_) => return std::ptr::null_mut(),
        },
    };

    let type_id = capsule.type_id();
    let origin = capsule.origin() as i32;
    // Ownership payload pindah ke caller sebagai raw pointer + len;
    // iris_capsule_free merekonstruksi pasangan yang sama persis.
    let payload: Box<[u8]> = capsule.into_payload().into_boxed_slice();
    let size = payload.len();
    let data = Box::into_raw(payload) as *mut u8;

    Box::into_raw(Box::new(IrisCapsule {
        data,
        size,
        type_id,
        origin,
    }))
}

/// Lepaskan capsule hasil `iris_drain`. Null adalah no-op.
///
/// # Safety
/// `capsule` harus null atau pointer yang berasal dari `iris_drain` dan
/// belum pernah dilepas.
#[no_mangle]
pub unsafe extern "C" fn iris_capsule_free(capsule: *mut IrisCapsule) {
    if capsule.is_null() {
        return;
    }
    let c = Box::from_raw(capsule);
    if !c.data.is_null() {
        drop(Box::from_raw(std::slice::from_raw_parts_mut(
            c.data, c.size,
        )));
    }
}

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

/// Ganti konfigurasi scaling bus. Scaling bersifat per-bus, maka semua
/// fungsi scaling menerima handle.
///
/// # Safety
/// `config` harus null atau menunjuk `IrisScalingConfig` valid.
#[no_mangle]
pub unsafe extern "C" fn iris_configure_scaling(
    handle: u32,
    config: *const IrisScalingConfig,
) -> i32 {
    if config.is_null() {
        return BusError::InvalidParams.code();
    }
    let bus = match registry::global().get(handle) {
        Ok(bus) => bus,
        Err(e) => return e.code(),
    };
    match bus.scaling().reconfigure(ScalingConfig::from(&*config)) {
        Ok(()) => CODE_SUCCESS,
        Err(e) => e.code(),
    }
}

/// Rekomendasi jumlah producer. Handle invalid mengembalikan 0.
#[no_mangle]
pub extern "C" fn iris_optimal_producer_count(handle: u32) -> u32 {
    registry::global()
        .get(handle)
        .map(|bus| bus.scaling().optimal_producer_count())
        .unwrap_or(0)
}

/// Rekomendasi jumlah consumer. Handle invalid mengembalikan 0.
#[no_mangle]
pub extern "C" fn iris_optimal_consumer_count(handle: u32) -> u32 {
    registry::global()
        .get(handle)
        .map(|bus| bus.scaling().optimal_consumer_count())
        .unwrap_or(0)
}

/// Paksa satu evaluasi scaling di luar interval otomatis.
#[no_mangle]
pub extern "C" fn iris_trigger_scale_evaluation(handle: u32) -> i32 {
    match registry::global().get(handle) {
        Ok(bus) => {
            bus.scaling().evaluate(bus.load_percent());
            CODE_SUCCESS
        }
        Err(e) => e.code(),
    }
}

// ---------------------------------------------------------------------------
// Accelerator
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn iris_accelerator_available() -> bool {
    accel::probe().available
}

#[no_mangle]
pub extern "C" fn iris_accelerator_capabilities() -> IrisAcceleratorCaps {
    let caps = accel::probe();
    IrisAcceleratorCaps {
        available: caps.available,
        memory_size: caps.memory_size,
        compute_capability: caps.compute_capability,
        max_parallel_units: caps.max_parallel_units,
    }
}

// ---------------------------------------------------------------------------
// Simple byte ABI
// ---------------------------------------------------------------------------

/// Membuat bus dengan kapasitas dalam MB, `size_mb` di [1, 64], segment
/// count default. Return handle, atau 0 kalau gagal.
#[no_mangle]
pub extern "C" fn iris_create_buffer(size_mb: u32) -> u32 {
    if !(MIN_BUFFER_MB..=MAX_BUFFER_MB).contains(&size_mb) {
        return 0;
    }
    iris_create(
        size_mb as usize * 1024 * 1024,
        DEFAULT_SEGMENT_COUNT as u32,
        LanguageTag::Unknown as i32,
    )
}

/// Tulis bytes mentah sebagai satu pesan (type_id 0, origin Unknown).
///
/// # Safety
/// `data` harus menunjuk minimal `size` bytes yang bisa dibaca.
#[no_mangle]
pub unsafe extern "C" fn iris_write_message(handle: u32, data: *const u8, size: u32) -> i32 {
    if data.is_null() {
        return BusError::InvalidParams.code();
    }
    let capsule = IrisCapsule {
        data: data as *mut u8,
        size: size as usize,
        type_id: 0,
        origin: LanguageTag::Unknown as i32,
    };
    iris_submit(handle, &capsule)
}

/// Baca satu pesan ke buffer caller. `actual` (boleh null) diisi ukuran
/// pesan. Kalau pesan lebih besar dari `out_capacity`, pesan diparkir di
/// pushback slot dan fungsi mengembalikan `InvalidParams`; panggilan
/// berikutnya dengan buffer cukup mengembalikan pesan yang sama.
///
/// # Safety
/// `out` harus menunjuk minimal `out_capacity` bytes yang bisa ditulis;
/// `actual` harus null atau menunjuk `u32` yang bisa ditulis.
#[no_mangle]
pub unsafe extern "C" fn iris_read_message(
    handle: u32,
    out: *mut u8,
    out_capacity: u32,
    actual: *mut u32,
) -> i32 {
    if out.is_null() {
        return BusError::InvalidParams.code();
    }
    let bus = match registry::global().get(handle) {
        Ok(bus) => bus,
        Err(e) => return e.code(),
    };
    let parked = pushback().lock().unwrap().remove(&handle);
    let capsule = match parked {
        Some(capsule) => capsule,
        None => match bus.drain(LanguageTag::Unknown) {
            Ok(capsule) => capsule,
            Err(e) => return e.code(),
        },
    };

    let size = capsule.size();
    if !actual.is_null() {
        *actual = size as u32;
    }

    if size > out_capacity as usize {
        // Buffer caller kekecilan: parkir pesan, jangan lewat bus lagi.
        // Pushback tidak tergantung kapasitas bus, jadi pesan tetap ada
        // meski bus keburu penuh sebelum retry.
        pushback().lock().unwrap().insert(handle, capsule);
        return BusError::InvalidParams.code();
    }

    std::ptr::copy_nonoverlapping(capsule.payload().as_ptr(), out, size);
    CODE_SUCCESS
}

/// Alias `iris_destroy` untuk simple byte ABI.
#[no_mangle]
pub extern "C" fn iris_destroy_buffer(handle: u32) -> i32 {
    iris_destroy(handle)
}

// ---------------------------------------------------------------------------
// Statistik dan introspeksi
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn iris_get_total_messages(handle: u32) -> u64 {
    registry::global()
        .get(handle)
        .map(|bus| bus.stats().total_messages)
        .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn iris_get_total_bytes(handle: u32) -> u64 {
    registry::global()
        .get(handle)
        .map(|bus| bus.stats().total_bytes)
        .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn iris_get_pending_messages(handle: u32) -> u32 {
    // Pesan yang diparkir di pushback slot belum sampai ke caller,
    // jadi tetap dihitung pending
    let parked = u32::from(pushback().lock().unwrap().contains_key(&handle));
    registry::global()
        .get(handle)
        .map(|bus| bus.stats().pending_messages + parked)
        .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn iris_get_active_segments(handle: u32) -> u32 {
    registry::global()
        .get(handle)
        .map(|bus| bus.stats().active_segments)
        .unwrap_or(0)
}

/// Fill ratio bus dalam persen (0-100). Handle invalid mengembalikan 0.
#[no_mangle]
pub extern "C" fn iris_get_load_percent(handle: u32) -> u32 {
    registry::global()
        .get(handle)
        .map(|bus| bus.load_percent())
        .unwrap_or(0)
}

/// Ukuran payload maksimum per pesan dalam bytes.
#[no_mangle]
pub extern "C" fn iris_max_message_size() -> u32 {
    MAX_PAYLOAD_SIZE as u32
}

/// Versi library, packed `major << 16 | minor << 8 | patch`.
#[no_mangle]
pub extern "C" fn iris_version() -> u32 {
    (crate::VERSION_MAJOR << 16) | (crate::VERSION_MINOR << 8) | crate::VERSION_PATCH
}

/// Deskripsi statis untuk kode error. Pointer valid selama proses hidup;
/// jangan di-free.
#[no_mangle]
pub extern "C" fn iris_error_string(code: i32) -> *const c_char {
    if code == CODE_SUCCESS {
        return b"success\0".as_ptr() as *const c_char;
    }
    match BusError::from_code(code) {
        Some(e) => e.as_cstr().as_ptr(),
        None => b"unknown error\0".as_ptr() as *const c_char,
    }
}

fn register(bus: Arc<dyn MessageBus>) -> u32 {
    match registry::global().insert(bus) {
        Ok(handle) => handle,
        Err(_) => 0,
    }
}
