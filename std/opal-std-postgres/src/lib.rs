//!
//! opal-std-postgres - PostgreSQL Bridge
//!
//! Provides blocking PostgreSQL access for opal programs through libpq.
//!
//! ## Architecture
//!
//! - `libpq` - minimal hand-declared bindings to the libpq client library
//! - `conn` - safe ownership layer: `PgConn` finishes the native connection
//!   exactly once, `PgResult` clears the native result on every path
//! - `bridge` - the C ABI surface the opal runtime calls; a connection is
//!   handed to the host as an `OpalExternal` whose release callback drops
//!   the `PgConn`
//!
//! ## API (std::db::postgres)
//!
//! - `connect(conninfo: string) -> connection throws DbError`
//! - `execute(conn: connection, sql: string, params: [string]) -> int throws DbError`
//! - `query(conn: connection, sql: string, params: [string]) -> [[string]] throws DbError`
//!
//! Parameters are bound positionally and passed as text; the server performs
//! its own type coercion. Results are surfaced as text cells in projection
//! order, rows in the engine's return order. SQL NULL is surfaced as the
//! empty string; the two are indistinguishable to the caller.
//!
//! ## Exceptions
//!
//! - `DbError { message: string, code: int }` - message carries the engine's
//!   diagnostic text
//!

pub mod bridge;
pub mod conn;
mod errors;
pub mod libpq;

pub use bridge::*;
pub use conn::*;
pub use errors::*;
