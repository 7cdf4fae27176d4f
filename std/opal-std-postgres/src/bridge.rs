//!
//! C ABI Surface
//!
//! Boundary functions the opal runtime calls. A connection crosses the
//! boundary as an `OpalExternal` whose release callback drops the owned
//! `PgConn`; parameters arrive as an array of string pointers; query results
//! leave as an array of row arrays of cell strings.
//!
//! Passing a connection object whose wrapper memory has already been freed
//! by the collector is undefined behavior, as for every handle in this
//! runtime. A wrapper that was released explicitly (data pointer already
//! null) is detected and raises a DbError instead.
//!

use std::ffi::c_void;

use opal_std_core::{
    opal_array_get, opal_array_len, opal_array_new, opal_array_push, opal_external_data,
    opal_external_new, opal_string_new, OpalArray, OpalExternal, OpalString,
};

use crate::conn::PgConn;
use crate::errors::{string_from_opal, throw_db_error, PgError};

/// Release callback registered on every connection external. Runs PQfinish
/// via the PgConn drop; safe to invoke from the collector's thread.
unsafe extern "C" fn pg_conn_finalize(data: *mut c_void) {
    if !data.is_null() {
        unsafe {
            drop(Box::from_raw(data as *mut PgConn));
        }
    }
}

/// Borrow the connection out of its wrapper, or throw if the wrapper was
/// already released.
unsafe fn conn_ref<'a>(ext: *const OpalExternal) -> Option<&'a PgConn> {
    let data = unsafe { opal_external_data(ext) };
    if data.is_null() {
        throw_db_error(&PgError::Exec("connection already released".into()));
        return None;
    }
    Some(unsafe { &*(data as *const PgConn) })
}

/// Collect positional parameters from a host array of string pointers.
/// A null array means no parameters.
unsafe fn params_from_array(params: *const OpalArray) -> Vec<String> {
    unsafe {
        let len = opal_array_len(params);
        let mut values = Vec::with_capacity(len as usize);
        for i in 0..len {
            let s = opal_array_get(params, i) as *const OpalString;
            values.push(string_from_opal(s));
        }
        values
    }
}

/// Open a connection using the engine's key=value conninfo syntax.
///
/// Returns a connection object with a registered release callback, or null
/// if an error occurred. On error, a DbError exception carries the engine's
/// diagnostic and the failed native connection has already been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_pg_connect(conninfo: *const OpalString) -> *mut OpalExternal {
    let dsn = unsafe { string_from_opal(conninfo) };

    match PgConn::connect(&dsn) {
        Ok(conn) => {
            let data = Box::into_raw(Box::new(conn)) as *mut c_void;
            unsafe { opal_external_new(data, Some(pg_conn_finalize)) }
        }
        Err(e) => {
            throw_db_error(&e);
            std::ptr::null_mut()
        }
    }
}

/// Execute a mutating statement with positional text parameters.
///
/// Returns the rows-affected count (zero when the engine reports no tag), or
/// -1 if an error occurred. On error, a DbError exception is set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_pg_exec(
    conn: *const OpalExternal,
    sql: *const OpalString,
    params: *const OpalArray,
) -> i64 {
    let Some(conn) = (unsafe { conn_ref(conn) }) else {
        return -1;
    };
    let sql = unsafe { string_from_opal(sql) };
    let values = unsafe { params_from_array(params) };

    match conn.exec(&sql, &values) {
        Ok(n) => n as i64,
        Err(e) => {
            throw_db_error(&e);
            -1
        }
    }
}

/// Execute a reading statement with positional text parameters.
///
/// Returns the result table as an array of row arrays of cell strings, or
/// null if an error occurred. Row order matches the engine's return order,
/// column order the statement's projection; SQL NULL cells are empty
/// strings. On error, a DbError exception is set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_pg_query(
    conn: *const OpalExternal,
    sql: *const OpalString,
    params: *const OpalArray,
) -> *mut OpalArray {
    let Some(conn) = (unsafe { conn_ref(conn) }) else {
        return std::ptr::null_mut();
    };
    let sql = unsafe { string_from_opal(sql) };
    let values = unsafe { params_from_array(params) };

    match conn.query(&sql, &values) {
        Ok(rows) => unsafe {
            let table = opal_array_new(rows.len());
            for row in &rows {
                let row_arr = opal_array_new(row.len());
                for cell in row {
                    let cell_str = opal_string_new(cell.as_ptr(), cell.len());
                    opal_array_push(row_arr, cell_str as i64);
                }
                opal_array_push(table, row_arr as i64);
            }
            table
        },
        Err(e) => {
            throw_db_error(&e);
            std::ptr::null_mut()
        }
    }
}
