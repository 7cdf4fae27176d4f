//!
//! Exception Handling Primitives
//!
//! Provides thread-local exception storage for try/catch support in opal.
//! Exceptions are stored as raw pointers and managed by the generated code.
//!
//! Exception Type IDs:
//! - 0: Unknown/User-defined exception
//! - 1: NetError
//! - 2: DbError
//!
//! Built-in exception objects share one layout:
//! - Offset 0: message pointer (8 bytes)
//! - Offset 8: code (8 bytes)
//!

use std::cell::Cell;

thread_local! {
    static CURRENT_EXCEPTION: Cell<*mut u8> = const { Cell::new(std::ptr::null_mut()) };
    static CURRENT_EXCEPTION_TYPE_ID: Cell<i64> = const { Cell::new(0) };
}

/// Exception type IDs for built-in exceptions
pub const EXCEPTION_TYPE_UNKNOWN: i64 = 0;
pub const EXCEPTION_TYPE_NET_ERROR: i64 = 1;
pub const EXCEPTION_TYPE_DB_ERROR: i64 = 2;

/// Set the current exception with type ID (called by throw)
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_set_typed(exception_ptr: *mut u8, type_id: i64) {
    CURRENT_EXCEPTION.with(|ex| ex.set(exception_ptr));
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.set(type_id));
}

/// Get the current exception pointer (null if none)
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_get() -> *mut u8 {
    CURRENT_EXCEPTION.with(|ex| ex.get())
}

/// Get the current exception type ID
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_get_type_id() -> i64 {
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.get())
}

/// Check if current exception matches the given type ID
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_is_type(type_id: i64) -> i64 {
    let current = CURRENT_EXCEPTION_TYPE_ID.with(|id| id.get());
    if current == type_id { 1 } else { 0 }
}

/// Check if there's a pending exception
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_check() -> i64 {
    CURRENT_EXCEPTION.with(|ex| if ex.get().is_null() { 0 } else { 1 })
}

/// Clear the current exception (called after catch handles it)
#[unsafe(no_mangle)]
pub extern "C" fn opal_exception_clear() {
    CURRENT_EXCEPTION.with(|ex| ex.set(std::ptr::null_mut()));
    CURRENT_EXCEPTION_TYPE_ID.with(|id| id.set(0));
}
