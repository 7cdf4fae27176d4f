//!
//! Runtime Value Representation
//!
//! opal values at runtime are 64-bit slots holding either inline primitives
//! (int, float, bool) or pointers to reference-counted heap objects. This
//! module defines the shared heap header and the string object.
//!
//! Strings are length-delimited byte sequences. They usually hold UTF-8 text
//! but the transport bridge moves raw socket payloads through them, so no
//! validity invariant is enforced here and embedded zero bytes are preserved.
//!

use std::alloc::{alloc, dealloc, Layout};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Type tags for heap objects
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapTag {
    String = 0,
    Array = 1,
    External = 2,
}

/// Header for all heap-allocated objects
#[repr(C)]
pub struct HeapHeader {
    pub refcount: AtomicUsize,
    pub tag: HeapTag,
    pub _pad: [u8; 7],
}

impl HeapHeader {
    pub fn new(tag: HeapTag) -> Self {
        Self {
            refcount: AtomicUsize::new(1),
            tag,
            _pad: [0; 7],
        }
    }

    pub fn incref(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decref(&self) -> bool {
        if self.refcount.fetch_sub(1, Ordering::Release) == 1 {
            std::sync::atomic::fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Relaxed)
    }
}

/// A heap-allocated string
#[repr(C)]
pub struct OpalString {
    pub header: HeapHeader,
    pub len: usize,
    pub data: [u8; 0],
}

impl OpalString {
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// View the contents as `&str`. Only valid for strings known to hold
    /// UTF-8; socket payloads must go through `as_bytes` instead.
    pub unsafe fn as_str(&self) -> &str {
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }
}

fn string_layout(len: usize) -> Layout {
    Layout::from_size_align(
        std::mem::size_of::<OpalString>() + len,
        std::mem::align_of::<OpalString>(),
    )
    .unwrap()
}

/// Allocate a new string on the heap, copying `len` bytes from `data`.
/// A null `data` pointer yields a zeroed string of the given length.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_new(data: *const u8, len: usize) -> *mut OpalString {
    unsafe {
        let ptr = alloc(string_layout(len)) as *mut OpalString;
        if ptr.is_null() {
            panic!("Failed to allocate string");
        }

        (*ptr).header = HeapHeader::new(HeapTag::String);
        (*ptr).len = len;

        if !data.is_null() && len > 0 {
            std::ptr::copy_nonoverlapping(data, (*ptr).data.as_mut_ptr(), len);
        }

        ptr
    }
}

/// Increment reference count of a string
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_incref(s: *mut OpalString) {
    if !s.is_null() {
        unsafe {
            (*s).header.incref();
        }
    }
}

/// Decrement reference count and free if zero
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_decref(s: *mut OpalString) {
    if !s.is_null() {
        unsafe {
            if (*s).header.decref() {
                let len = (*s).len;
                dealloc(s as *mut u8, string_layout(len));
            }
        }
    }
}

/// Get string length in bytes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_len(s: *const OpalString) -> i64 {
    if s.is_null() {
        0
    } else {
        unsafe { (*s).len as i64 }
    }
}

/// Get pointer to string data
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_data(s: *const OpalString) -> *const u8 {
    if s.is_null() {
        std::ptr::null()
    } else {
        unsafe { (*s).data.as_ptr() }
    }
}

/// Compare two strings for byte equality
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_string_eq(a: *const OpalString, b: *const OpalString) -> i64 {
    unsafe {
        if a.is_null() && b.is_null() {
            return 1;
        }
        if a.is_null() || b.is_null() {
            return 0;
        }
        if (*a).as_bytes() == (*b).as_bytes() { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_creation() {
        unsafe {
            let data = b"hello";
            let s = opal_string_new(data.as_ptr(), data.len());
            assert!(!s.is_null());
            assert_eq!((*s).len, 5);
            assert_eq!((*s).header.refcount(), 1);
            assert_eq!((*s).as_bytes(), b"hello");
            opal_string_decref(s);
        }
    }

    #[test]
    fn test_string_embedded_zero_bytes() {
        unsafe {
            let data = b"a\0b";
            let s = opal_string_new(data.as_ptr(), data.len());
            assert_eq!(opal_string_len(s), 3);
            assert_eq!((*s).as_bytes(), b"a\0b");
            opal_string_decref(s);
        }
    }

    #[test]
    fn test_string_eq() {
        unsafe {
            let a = opal_string_new(b"same".as_ptr(), 4);
            let b = opal_string_new(b"same".as_ptr(), 4);
            let c = opal_string_new(b"other".as_ptr(), 5);

            assert_eq!(opal_string_eq(a, b), 1);
            assert_eq!(opal_string_eq(a, c), 0);
            assert_eq!(opal_string_eq(std::ptr::null(), std::ptr::null()), 1);
            assert_eq!(opal_string_eq(a, std::ptr::null()), 0);

            opal_string_decref(a);
            opal_string_decref(b);
            opal_string_decref(c);
        }
    }

    #[test]
    fn test_string_refcount() {
        unsafe {
            let s = opal_string_new(b"shared".as_ptr(), 6);
            opal_string_incref(s);
            assert_eq!((*s).header.refcount(), 2);
            opal_string_decref(s);
            assert_eq!((*s).header.refcount(), 1);
            opal_string_decref(s);
        }
    }
}
