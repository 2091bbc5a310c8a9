//! FFI bindings for the lockcheck C API
//!
//! An interposition shim (for example an `LD_PRELOAD` library wrapping
//! `pthread_mutex_lock`) resolves the real primitive itself and calls into
//! these functions around it: `lockcheck_mutex_acquired` after the real lock
//! returned, `lockcheck_mutex_releasing` before the real unlock is called.
//! Mutexes are identified by their address, threads by lockcheck's own
//! per-thread id.

use crate::core::detector;
use crate::core::types::get_current_thread_id;
use crate::core::LockCheck;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::{c_char, c_int, c_ulong};
use std::sync::atomic::{AtomicBool, Ordering};

// Globals to track initialization state
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize lockcheck.
///
/// # Arguments
/// * `log_path` - Path to a log file as a null-terminated C string, or NULL to disable logging.
/// * `callback` - Function receiving each diagnostic as a JSON string, or NULL to print
///   diagnostics to stderr.
///
/// # Returns
/// * `0` on success
/// * `1` if lockcheck is already initialized
/// * `-1` if the log path contains invalid UTF-8
/// * `-2` if the logger failed to initialize
///
/// # Safety
/// The caller must ensure `log_path` is either `NULL` or a valid null-terminated string.
/// The JSON string passed to `callback` is only valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn lockcheck_init(
    log_path: *const c_char,
    callback: Option<extern "C" fn(*const c_char)>,
) -> c_int {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return 1; // Already initialized
    }

    let mut builder = LockCheck::new();

    if !log_path.is_null() {
        // SAFETY: caller guarantees a valid null-terminated string
        match unsafe { CStr::from_ptr(log_path) }.to_str() {
            Ok(path) => builder = builder.with_log(path),
            Err(_) => {
                INITIALIZED.store(false, Ordering::SeqCst);
                return -1; // Invalid UTF-8
            }
        }
    }

    if let Some(cb) = callback {
        builder = builder.callback(move |diagnostic| {
            // Format diagnostic as JSON, then pass ptr to callback
            if let Ok(json) = serde_json::to_string(&diagnostic)
                && let Ok(c_str) = CString::new(json)
            {
                cb(c_str.as_ptr());
            }
        });
    }

    match builder.start() {
        Ok(()) => 0,
        Err(_) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            -2
        }
    }
}

/// Report that the calling thread has acquired the mutex at `mutex`.
///
/// Call after the real lock function returned successfully.
#[unsafe(no_mangle)]
pub extern "C" fn lockcheck_mutex_acquired(mutex: *const c_void) {
    detector::on_lock_acquired(get_current_thread_id(), mutex as usize);
}

/// Report that the calling thread is about to release the mutex at `mutex`.
///
/// Call before the real unlock function.
#[unsafe(no_mangle)]
pub extern "C" fn lockcheck_mutex_releasing(mutex: *const c_void) {
    detector::on_lock_release(get_current_thread_id(), mutex as usize);
}

/// Flush all pending log entries to disk.
///
/// # Returns
/// * `0` on success
/// * `-1` if the flush failed
#[unsafe(no_mangle)]
pub extern "C" fn lockcheck_flush_logs() -> c_int {
    match detector::flush_global_detector_logs() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Get the lockcheck id of the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn lockcheck_get_thread_id() -> c_ulong {
    get_current_thread_id() as c_ulong
}

/// Check whether lockcheck has been initialized.
///
/// # Returns
/// * `1` if initialized
/// * `0` otherwise
#[unsafe(no_mangle)]
pub extern "C" fn lockcheck_is_initialized() -> c_int {
    INITIALIZED.load(Ordering::SeqCst) as c_int
}
