//!
//! Database Exception Types
//!
//! Provides the DbError exception for SQL bridge failures, plus the internal
//! error enum the connection layer returns before anything crosses the
//! boundary. Errors carry the engine's diagnostic text only; there is no
//! machine-readable classification in this bridge.
//!
//! ## Exception Layout
//!
//! - Offset 0: message pointer (8 bytes)
//! - Offset 8: code (8 bytes) - always -1, reserved
//!

use opal_std_core::{
    opal_exception_set_typed, opal_string_new, OpalString, EXCEPTION_TYPE_DB_ERROR,
};
use thiserror::Error;

/// SQL bridge failure, tagged by the failing operation. The payload is the
/// engine's diagnostic text.
#[derive(Debug, Error)]
pub enum PgError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("statement execution failed: {0}")]
    Exec(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Create a new DbError exception on the heap
///
/// Exception layout:
/// - Offset 0: message pointer (8 bytes)
/// - Offset 8: code (8 bytes)
///
/// Total size: 16 bytes
#[unsafe(no_mangle)]
pub extern "C" fn opal_db_error_new(message: *const OpalString, code: i64) -> *mut u8 {
    unsafe {
        let layout = std::alloc::Layout::from_size_align(16, 8).unwrap();
        let ptr = std::alloc::alloc(layout);
        if ptr.is_null() {
            panic!("Failed to allocate DbError");
        }

        *(ptr as *mut i64) = message as i64;
        *(ptr.add(8) as *mut i64) = code;

        ptr
    }
}

/// Helper to extract a lossy UTF-8 string from an OpalString pointer
///
/// # Safety
/// The caller must ensure `s` is a valid pointer to an OpalString or null.
pub(crate) unsafe fn string_from_opal(s: *const OpalString) -> String {
    if s.is_null() {
        return String::new();
    }
    unsafe { String::from_utf8_lossy((*s).as_bytes()).into_owned() }
}

/// Throw a DbError: allocate the exception object and set the thread-local
/// exception slot.
pub(crate) fn throw_db_error(error: &PgError) {
    let message = error.to_string();

    unsafe {
        let message_ptr = opal_string_new(message.as_ptr(), message.len());
        let db_error = opal_db_error_new(message_ptr, -1);
        opal_exception_set_typed(db_error, EXCEPTION_TYPE_DB_ERROR);
    }
}
