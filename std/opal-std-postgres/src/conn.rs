//!
//! Connection Ownership Layer
//!
//! `PgConn` owns a native libpq connection and finishes it exactly once when
//! dropped, no matter which thread drops it. `PgResult` owns a native result
//! object and clears it on every path, success or failure, so statement
//! errors never leak result memory.
//!
//! Parameters are bound positionally and passed as text with no type OIDs,
//! leaving type inference and coercion to the server. A zero-length
//! parameter list passes null pointers instead of a zero-size buffer.
//!

use std::ffi::{CStr, CString};

use libc::{c_char, c_int};
use tracing::debug;

use crate::errors::PgError;
use crate::libpq::*;

/// Read a libpq diagnostic string. Diagnostics end with a newline; trim it.
unsafe fn diagnostic(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return "unknown error".to_string();
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_string_lossy()
            .trim_end()
            .to_string()
    }
}

/// Parse the command-completion tag's rows-affected count. The tag is empty
/// for statements without one (for example DDL); that counts as zero.
pub(crate) fn parse_affected(tag: &str) -> u64 {
    if tag.is_empty() {
        0
    } else {
        tag.parse().unwrap_or(0)
    }
}

/// An owned native result. Cleared exactly once on drop.
pub(crate) struct PgResult {
    raw: *mut PGresult,
}

impl PgResult {
    fn status(&self) -> ExecStatusType {
        unsafe { PQresultStatus(self.raw) }
    }

    fn error_message(&self) -> String {
        unsafe { diagnostic(PQresultErrorMessage(self.raw)) }
    }

    fn affected_rows(&self) -> u64 {
        let tag = unsafe { diagnostic(PQcmdTuples(self.raw)) };
        parse_affected(&tag)
    }

    /// Materialize the result row-major, column-major within each row.
    /// Cells arrive in text format; SQL NULL becomes the empty string.
    fn rows(&self) -> Vec<Vec<String>> {
        unsafe {
            let nrows = PQntuples(self.raw);
            let ncols = PQnfields(self.raw);

            let mut table = Vec::with_capacity(nrows as usize);
            for row in 0..nrows {
                let mut cells = Vec::with_capacity(ncols as usize);
                for col in 0..ncols {
                    if PQgetisnull(self.raw, row, col) != 0 {
                        cells.push(String::new());
                    } else {
                        let ptr = PQgetvalue(self.raw, row, col) as *const u8;
                        let len = PQgetlength(self.raw, row, col) as usize;
                        let bytes = std::slice::from_raw_parts(ptr, len);
                        cells.push(String::from_utf8_lossy(bytes).into_owned());
                    }
                }
                table.push(cells);
            }
            table
        }
    }
}

impl Drop for PgResult {
    fn drop(&mut self) {
        unsafe {
            PQclear(self.raw);
        }
    }
}

/// An owned native PostgreSQL connection.
///
/// Send so the host collector may release it from any thread; not Sync, and
/// the caller contract is one thread of execution per connection at a time.
pub struct PgConn {
    raw: *mut PGconn,
}

unsafe impl Send for PgConn {}

impl PgConn {
    /// Open a connection using the engine's key=value conninfo syntax.
    /// On failure the partially created native connection is finished before
    /// the error is returned.
    pub fn connect(conninfo: &str) -> Result<Self, PgError> {
        let conninfo_c = CString::new(conninfo)
            .map_err(|_| PgError::Connect("connection string contains a zero byte".into()))?;

        let raw = unsafe { PQconnectdb(conninfo_c.as_ptr()) };
        if raw.is_null() {
            return Err(PgError::Connect("out of memory".into()));
        }

        if unsafe { PQstatus(raw) } != CONNECTION_OK {
            let message = unsafe { diagnostic(PQerrorMessage(raw)) };
            unsafe { PQfinish(raw) };
            debug!(error = %message, "postgres connection failed");
            return Err(PgError::Connect(message));
        }

        debug!("postgres connection established");
        Ok(Self { raw })
    }

    /// Dispatch a statement with positional text parameters and a text-format
    /// result. `mk` tags any failure with the calling operation's variant.
    fn exec_params(
        &self,
        sql: &str,
        params: &[String],
        mk: fn(String) -> PgError,
    ) -> Result<PgResult, PgError> {
        let sql_c =
            CString::new(sql).map_err(|_| mk("statement contains a zero byte".into()))?;

        let values: Vec<CString> = params
            .iter()
            .map(|p| {
                CString::new(p.as_str())
                    .map_err(|_| mk("parameter value contains a zero byte".into()))
            })
            .collect::<Result<_, _>>()?;
        let value_ptrs: Vec<*const c_char> = values.iter().map(|v| v.as_ptr()).collect();

        // Zero parameters must pass null, not a zero-length buffer.
        let (n_params, values_ptr) = if value_ptrs.is_empty() {
            (0, std::ptr::null())
        } else {
            (value_ptrs.len() as c_int, value_ptrs.as_ptr())
        };

        let raw = unsafe {
            PQexecParams(
                self.raw,
                sql_c.as_ptr(),
                n_params,
                std::ptr::null(), // parameter types: inferred by the server
                values_ptr,
                std::ptr::null(), // lengths: text values are NUL-delimited
                std::ptr::null(), // formats: all text
                0,                // text-format result
            )
        };

        if raw.is_null() {
            return Err(mk(unsafe { diagnostic(PQerrorMessage(self.raw)) }));
        }

        Ok(PgResult { raw })
    }

    /// Execute a mutating statement; returns the rows-affected count from
    /// the command-completion tag, zero when the tag is absent. A
    /// data-bearing result is also accepted.
    pub fn exec(&self, sql: &str, params: &[String]) -> Result<u64, PgError> {
        let res = self.exec_params(sql, params, PgError::Exec)?;
        match res.status() {
            PGRES_COMMAND_OK | PGRES_TUPLES_OK => Ok(res.affected_rows()),
            _ => {
                let message = res.error_message();
                debug!(error = %message, "statement execution failed");
                Err(PgError::Exec(message))
            }
        }
    }

    /// Execute a reading statement; requires a data-bearing result and
    /// returns it as rows of text cells.
    pub fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Vec<String>>, PgError> {
        let res = self.exec_params(sql, params, PgError::Query)?;
        if res.status() != PGRES_TUPLES_OK {
            let message = res.error_message();
            debug!(error = %message, "query failed");
            return Err(PgError::Query(message));
        }
        Ok(res.rows())
    }
}

impl Drop for PgConn {
    fn drop(&mut self) {
        unsafe {
            PQfinish(self.raw);
        }
    }
}
