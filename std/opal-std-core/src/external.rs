//!
//! External Resource Objects
//!
//! An `OpalExternal` wraps a pointer to a native resource (for example a
//! database connection) that the host runtime cannot represent directly.
//! The wrapper registers a release callback at construction; the callback
//! runs exactly once, either when the reference count reaches zero or when
//! `opal_external_release` is called explicitly.
//!
//! After release the data pointer is null and the callback slot is cleared,
//! so a later decref of a still-reachable wrapper does not release twice.
//! The callback may run on whatever thread drops the last reference, so the
//! wrapped resource must not assume it is released on its creating thread.
//!
//! A single wrapper must not be used from two threads at the same time; that
//! is the caller's contract for every handle in this runtime.
//!

use crate::value::{HeapHeader, HeapTag};
use std::alloc::{alloc, dealloc, Layout};
use std::ffi::c_void;

/// Release callback signature. Receives the wrapped data pointer.
pub type ExternalFinalizer = unsafe extern "C" fn(*mut c_void);

/// A heap-allocated wrapper around a native resource pointer
#[repr(C)]
pub struct OpalExternal {
    pub header: HeapHeader,
    data: *mut c_void,
    finalize: Option<ExternalFinalizer>,
}

/// Allocate a new external object owning `data`, with `finalize` registered
/// as its release callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_external_new(
    data: *mut c_void,
    finalize: Option<ExternalFinalizer>,
) -> *mut OpalExternal {
    unsafe {
        let layout = Layout::new::<OpalExternal>();
        let ptr = alloc(layout) as *mut OpalExternal;
        if ptr.is_null() {
            panic!("Failed to allocate external object");
        }

        (*ptr).header = HeapHeader::new(HeapTag::External);
        (*ptr).data = data;
        (*ptr).finalize = finalize;

        ptr
    }
}

/// Get the wrapped data pointer. Null once the object has been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_external_data(ext: *const OpalExternal) -> *mut c_void {
    if ext.is_null() {
        std::ptr::null_mut()
    } else {
        unsafe { (*ext).data }
    }
}

/// Run the release callback now, ahead of collection. Idempotent: a second
/// call, or a later final decref, finds the callback slot empty.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_external_release(ext: *mut OpalExternal) {
    if ext.is_null() {
        return;
    }

    unsafe {
        let data = (*ext).data;
        let finalize = (*ext).finalize.take();
        (*ext).data = std::ptr::null_mut();

        if let Some(f) = finalize {
            f(data);
        }
    }
}

/// Increment reference count
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_external_incref(ext: *mut OpalExternal) {
    if !ext.is_null() {
        unsafe {
            (*ext).header.incref();
        }
    }
}

/// Decrement reference count; on zero, run the release callback (if still
/// registered) and free the wrapper.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_external_decref(ext: *mut OpalExternal) {
    if !ext.is_null() {
        unsafe {
            if (*ext).header.decref() {
                opal_external_release(ext);
                dealloc(ext as *mut u8, Layout::new::<OpalExternal>());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RELEASE_COUNT: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_finalizer(_data: *mut c_void) {
        RELEASE_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_release_runs_once_on_decref() {
        unsafe {
            RELEASE_COUNT.store(0, Ordering::SeqCst);
            let marker = 0xABCD_usize as *mut c_void;
            let ext = opal_external_new(marker, Some(counting_finalizer));

            assert_eq!(opal_external_data(ext), marker);

            opal_external_incref(ext);
            opal_external_decref(ext);
            assert_eq!(RELEASE_COUNT.load(Ordering::SeqCst), 0);

            opal_external_decref(ext);
            assert_eq!(RELEASE_COUNT.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_explicit_release_then_decref() {
        unsafe {
            RELEASE_COUNT.store(0, Ordering::SeqCst);
            let ext = opal_external_new(0x1_usize as *mut c_void, Some(counting_finalizer));

            opal_external_release(ext);
            assert_eq!(RELEASE_COUNT.load(Ordering::SeqCst), 1);
            assert!(opal_external_data(ext).is_null());

            // The wrapper is still alive; releasing again must be a no-op
            // and the final decref must not run the callback a second time.
            opal_external_release(ext);
            opal_external_decref(ext);
            assert_eq!(RELEASE_COUNT.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_release_from_another_thread() {
        unsafe {
            RELEASE_COUNT.store(0, Ordering::SeqCst);
            let ext = opal_external_new(0x2_usize as *mut c_void, Some(counting_finalizer));
            let addr = ext as usize;

            std::thread::spawn(move || {
                opal_external_decref(addr as *mut OpalExternal);
            })
            .join()
            .unwrap();

            assert_eq!(RELEASE_COUNT.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_external_without_finalizer() {
        unsafe {
            let ext = opal_external_new(std::ptr::null_mut(), None);
            opal_external_decref(ext);
        }
    }
}
