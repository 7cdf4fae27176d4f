//!
//! opal-std-net - Raw TCP Transport Bridge
//!
//! Provides blocking TCP primitives for opal programs over raw POSIX file
//! descriptors. A socket handle is the operating-system descriptor itself,
//! passed by value; the bridge never closes a descriptor implicitly and
//! never wraps it in a host object.
//!
//! ## TCP API (std::net::tcp)
//!
//! - `listen(port: u16) -> socket throws NetError`
//! - `accept(server: socket) -> socket throws NetError`
//! - `receive(socket: socket) -> string throws NetError`
//! - `send(socket: socket, data: string) throws NetError`
//! - `close(socket: socket)`
//!
//! Every operation blocks its calling thread for its entire duration. A
//! handle must be used by at most one thread at a time; distinct handles are
//! fully independent.
//!
//! ## Process-wide side effect
//!
//! The first `listen` (or an explicit `opal_net_init`) sets the process to
//! ignore SIGPIPE, so a write to a peer that closed its side fails as an
//! ordinary I/O error instead of terminating the process. The disposition is
//! set once and never reverted.
//!
//! ## Exceptions
//!
//! - `NetError { message: string, code: int }` - message names the failing
//!   primitive (`bind() failed: ...`), code is the OS errno
//!

mod errors;
pub mod tcp;

pub use errors::*;
pub use tcp::*;
