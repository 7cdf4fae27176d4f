//!
//! Runtime Array Type
//!
//! Provides heap-allocated, reference-counted arrays for opal. Arrays are
//! generic over element type at the opal level; at runtime every element is
//! a 64-bit slot (a primitive or an object pointer).
//!
//! The SQL bridge uses arrays in two shapes: a flat array of string pointers
//! for positional parameters, and an array of arrays of string pointers for
//! query result tables. The typed decref variants release those element
//! objects along with the array itself.
//!

use crate::value::{HeapHeader, HeapTag, OpalString, opal_string_decref};
use std::alloc::{alloc, dealloc, realloc, Layout};

/// A heap-allocated array of i64 slots
#[repr(C)]
pub struct OpalArray {
    pub header: HeapHeader,
    pub len: usize,
    pub capacity: usize,
    pub data: *mut i64,
}

/// Create a new empty array with given initial capacity
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_new(capacity: usize) -> *mut OpalArray {
    unsafe {
        let layout = Layout::new::<OpalArray>();
        let ptr = alloc(layout) as *mut OpalArray;
        if ptr.is_null() {
            panic!("Failed to allocate array");
        }

        let cap = if capacity == 0 { 4 } else { capacity };
        let data_layout = Layout::array::<i64>(cap).unwrap();
        let data = alloc(data_layout) as *mut i64;
        if data.is_null() {
            dealloc(ptr as *mut u8, layout);
            panic!("Failed to allocate array data");
        }

        (*ptr).header = HeapHeader::new(HeapTag::Array);
        (*ptr).len = 0;
        (*ptr).capacity = cap;
        (*ptr).data = data;

        ptr
    }
}

/// Increment reference count
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_incref(arr: *mut OpalArray) {
    if !arr.is_null() {
        unsafe {
            (*arr).header.incref();
        }
    }
}

unsafe fn free_array(arr: *mut OpalArray) {
    unsafe {
        let data_layout = Layout::array::<i64>((*arr).capacity).unwrap();
        dealloc((*arr).data as *mut u8, data_layout);
        dealloc(arr as *mut u8, Layout::new::<OpalArray>());
    }
}

/// Decrement reference count and free if zero (for arrays of primitives)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_decref(arr: *mut OpalArray) {
    if !arr.is_null() {
        unsafe {
            if (*arr).header.decref() {
                free_array(arr);
            }
        }
    }
}

/// Decrement reference count and free if zero, also decref string elements
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_decref_strings(arr: *mut OpalArray) {
    if !arr.is_null() {
        unsafe {
            if (*arr).header.decref() {
                for i in 0..(*arr).len {
                    let elem = *(*arr).data.add(i);
                    if elem != 0 {
                        opal_string_decref(elem as *mut OpalString);
                    }
                }
                free_array(arr);
            }
        }
    }
}

/// Decrement reference count and free if zero, also releasing nested arrays
/// of strings. This is the shape of a query result table: an array of rows,
/// each row an array of cell strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_decref_arrays(arr: *mut OpalArray) {
    if !arr.is_null() {
        unsafe {
            if (*arr).header.decref() {
                for i in 0..(*arr).len {
                    let elem = *(*arr).data.add(i);
                    if elem != 0 {
                        opal_array_decref_strings(elem as *mut OpalArray);
                    }
                }
                free_array(arr);
            }
        }
    }
}

/// Get array length
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_len(arr: *const OpalArray) -> i64 {
    if arr.is_null() {
        0
    } else {
        unsafe { (*arr).len as i64 }
    }
}

/// Get element at index (returns 0 if out of bounds)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_get(arr: *const OpalArray, index: i64) -> i64 {
    if arr.is_null() {
        return 0;
    }

    unsafe {
        let idx = index as usize;
        if idx >= (*arr).len {
            return 0;
        }
        *(*arr).data.add(idx)
    }
}

/// Push element to end of array
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_array_push(arr: *mut OpalArray, value: i64) {
    if arr.is_null() {
        return;
    }

    unsafe {
        if (*arr).len >= (*arr).capacity {
            let new_capacity = (*arr).capacity * 2;
            let old_layout = Layout::array::<i64>((*arr).capacity).unwrap();
            let new_layout = Layout::array::<i64>(new_capacity).unwrap();

            let new_data =
                realloc((*arr).data as *mut u8, old_layout, new_layout.size()) as *mut i64;
            if new_data.is_null() {
                panic!("Failed to grow array");
            }

            (*arr).data = new_data;
            (*arr).capacity = new_capacity;
        }

        *(*arr).data.add((*arr).len) = value;
        (*arr).len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::opal_string_new;

    #[test]
    fn test_array_creation() {
        unsafe {
            let arr = opal_array_new(10);
            assert!(!arr.is_null());
            assert_eq!((*arr).len, 0);
            assert_eq!((*arr).capacity, 10);
            opal_array_decref(arr);
        }
    }

    #[test]
    fn test_array_push_get() {
        unsafe {
            let arr = opal_array_new(2);
            opal_array_push(arr, 10);
            opal_array_push(arr, 20);
            opal_array_push(arr, 30);

            assert_eq!(opal_array_len(arr), 3);
            assert_eq!(opal_array_get(arr, 0), 10);
            assert_eq!(opal_array_get(arr, 1), 20);
            assert_eq!(opal_array_get(arr, 2), 30);
            assert_eq!(opal_array_get(arr, 3), 0);

            opal_array_decref(arr);
        }
    }

    #[test]
    fn test_array_of_strings_decref() {
        unsafe {
            let arr = opal_array_new(2);
            opal_array_push(arr, opal_string_new(b"a".as_ptr(), 1) as i64);
            opal_array_push(arr, opal_string_new(b"b".as_ptr(), 1) as i64);
            opal_array_decref_strings(arr);
        }
    }

    #[test]
    fn test_nested_array_decref() {
        unsafe {
            let table = opal_array_new(2);
            for _ in 0..2 {
                let row = opal_array_new(2);
                opal_array_push(row, opal_string_new(b"x".as_ptr(), 1) as i64);
                opal_array_push(row, opal_string_new(b"y".as_ptr(), 1) as i64);
                opal_array_push(table, row as i64);
            }
            assert_eq!(opal_array_len(table), 2);
            opal_array_decref_arrays(table);
        }
    }
}
