//! Logging bootstrap shared by binaries and tests.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize env_logger once. Safe to call from multiple tests.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(cfg!(test)).try_init();
    });
}
