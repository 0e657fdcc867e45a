//! Integration test: lifecycle library di boundary C.
//!
//! Binary terpisah karena `iris_shutdown` menutup SEMUA bus di registry
//! proses; test lain tidak boleh kena efeknya.

use iris::ffi::{iris_create, iris_destroy, iris_get_pending_messages, iris_init, iris_shutdown};
use iris::{BusError, CODE_SUCCESS};

#[test]
fn test_init_shutdown_lifecycle() {
    // Init idempotent
    assert_eq!(iris_init(), CODE_SUCCESS);
    assert_eq!(iris_init(), CODE_SUCCESS);

    let h1 = iris_create(64 * 1024, 2, 0);
    let h2 = iris_create(64 * 1024, 2, 0);
    assert_ne!(h1, 0);
    assert_ne!(h2, 0);
    assert_ne!(h1, h2);

    // Shutdown menutup semua bus; handle lama jadi invalid
    assert_eq!(iris_shutdown(), CODE_SUCCESS);
    assert_eq!(iris_destroy(h1), BusError::InvalidHandle.code());
    assert_eq!(iris_destroy(h2), BusError::InvalidHandle.code());
    assert_eq!(iris_get_pending_messages(h1), 0);

    // Shutdown kedua adalah no-op, dan library tetap bisa dipakai lagi
    assert_eq!(iris_shutdown(), CODE_SUCCESS);
    let h3 = iris_create(64 * 1024, 2, 0);
    assert_ne!(h3, 0);
    assert_eq!(iris_destroy(h3), CODE_SUCCESS);
}
