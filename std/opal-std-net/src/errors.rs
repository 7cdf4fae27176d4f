//!
//! Network Exception Types
//!
//! Provides the NetError exception for transport bridge failures, plus the
//! internal error enum the socket layer returns before anything crosses the
//! boundary.
//!
//! ## Exception Layout
//!
//! - Offset 0: message pointer (8 bytes)
//! - Offset 8: code (8 bytes) - OS errno of the failing call
//!

use opal_std_core::{
    opal_exception_set_typed, opal_string_new, OpalString, EXCEPTION_TYPE_NET_ERROR,
};
use thiserror::Error;

/// Transport bridge failure, tagged by the primitive that failed. Every
/// variant carries the underlying OS error; no retry, no partial-result
/// recovery.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("socket() failed: {0}")]
    Socket(std::io::Error),
    #[error("bind() failed: {0}")]
    Bind(std::io::Error),
    #[error("listen() failed: {0}")]
    Listen(std::io::Error),
    #[error("accept() failed: {0}")]
    Accept(std::io::Error),
    #[error("read() failed: {0}")]
    Receive(std::io::Error),
    #[error("write() failed: {0}")]
    Send(std::io::Error),
}

impl NetError {
    /// OS errno of the failing call, or -1 when unavailable
    pub fn code(&self) -> i64 {
        let io = match self {
            NetError::Socket(e)
            | NetError::Bind(e)
            | NetError::Listen(e)
            | NetError::Accept(e)
            | NetError::Receive(e)
            | NetError::Send(e) => e,
        };
        io.raw_os_error().map(i64::from).unwrap_or(-1)
    }
}

/// Create a new NetError exception on the heap
///
/// Exception layout:
/// - Offset 0: message pointer (8 bytes)
/// - Offset 8: code (8 bytes)
///
/// Total size: 16 bytes
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_error_new(message: *const OpalString, code: i64) -> *mut u8 {
    unsafe {
        let layout = std::alloc::Layout::from_size_align(16, 8).unwrap();
        let ptr = std::alloc::alloc(layout);
        if ptr.is_null() {
            panic!("Failed to allocate NetError");
        }

        *(ptr as *mut i64) = message as i64;
        *(ptr.add(8) as *mut i64) = code;

        ptr
    }
}

/// Throw a NetError: allocate the exception object and set the thread-local
/// exception slot.
pub(crate) fn throw_net_error(error: NetError) {
    let message = error.to_string();
    let code = error.code();

    unsafe {
        let message_ptr = opal_string_new(message.as_ptr(), message.len());
        let net_error = opal_net_error_new(message_ptr, code);
        opal_exception_set_typed(net_error, EXCEPTION_TYPE_NET_ERROR);
    }
}
