//!
//! Minimal libpq Bindings
//!
//! Hand-declared surface of the PostgreSQL client C library, limited to what
//! the bridge uses: connection setup/teardown, parameterized execution with
//! text-format results, and result inspection. Everything here is raw; the
//! ownership rules live in `conn`.
//!

use libc::{c_char, c_int, c_uint};

/// PostgreSQL object identifier. Passing null for a parameter-type array
/// makes the server infer each parameter's type.
pub type Oid = c_uint;

/// Opaque connection object owned by libpq
#[repr(C)]
pub struct PGconn {
    _opaque: [u8; 0],
}

/// Opaque result object owned by libpq
#[repr(C)]
pub struct PGresult {
    _opaque: [u8; 0],
}

pub type ConnStatusType = c_int;
pub const CONNECTION_OK: ConnStatusType = 0;

pub type ExecStatusType = c_int;
pub const PGRES_COMMAND_OK: ExecStatusType = 1;
pub const PGRES_TUPLES_OK: ExecStatusType = 2;

#[link(name = "pq")]
unsafe extern "C" {
    pub fn PQconnectdb(conninfo: *const c_char) -> *mut PGconn;
    pub fn PQstatus(conn: *const PGconn) -> ConnStatusType;
    pub fn PQerrorMessage(conn: *const PGconn) -> *const c_char;
    pub fn PQfinish(conn: *mut PGconn);

    pub fn PQexecParams(
        conn: *mut PGconn,
        command: *const c_char,
        n_params: c_int,
        param_types: *const Oid,
        param_values: *const *const c_char,
        param_lengths: *const c_int,
        param_formats: *const c_int,
        result_format: c_int,
    ) -> *mut PGresult;

    pub fn PQresultStatus(res: *const PGresult) -> ExecStatusType;
    pub fn PQresultErrorMessage(res: *const PGresult) -> *const c_char;
    pub fn PQcmdTuples(res: *mut PGresult) -> *const c_char;
    pub fn PQntuples(res: *const PGresult) -> c_int;
    pub fn PQnfields(res: *const PGresult) -> c_int;
    pub fn PQgetvalue(res: *const PGresult, row: c_int, col: c_int) -> *const c_char;
    pub fn PQgetlength(res: *const PGresult, row: c_int, col: c_int) -> c_int;
    pub fn PQgetisnull(res: *const PGresult, row: c_int, col: c_int) -> c_int;
    pub fn PQclear(res: *mut PGresult);
}
