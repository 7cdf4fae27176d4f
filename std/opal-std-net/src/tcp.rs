//!
//! Blocking TCP Primitives
//!
//! Raw POSIX socket operations for opal programs. Handles are the OS file
//! descriptors themselves: created by `listen`/`accept`, destroyed only by
//! an explicit `close`, reused freely by the OS afterwards. Validity of a
//! handle is extrinsic; nothing here tracks or guards it.
//!
//! `receive` performs exactly one bounded read and returns whatever bytes
//! arrived; framing and aggregation belong to the caller. `send` loops until
//! the kernel has accepted every byte.
//!

use std::ffi::c_void;
use std::io;
use std::sync::Once;

use libc::{c_int, socklen_t};
use opal_std_core::{opal_string_new, OpalString};
use tracing::{debug, trace};

use crate::errors::{throw_net_error, NetError};

/// One receive call reads at most this many bytes.
const RECV_BUFFER_SIZE: usize = 65536;

/// Pending-connection queue depth for listeners.
const LISTEN_BACKLOG: c_int = 128;

static SIGPIPE_INIT: Once = Once::new();

/// Ignore SIGPIPE process-wide so that writes to a closed peer surface as
/// EPIPE from write() instead of killing the process. Set once, never
/// reverted.
fn ignore_sigpipe() {
    SIGPIPE_INIT.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}

/// Explicit process-wide socket setup, for composing applications that want
/// the SIGPIPE side effect to happen visibly at startup rather than inside
/// the first `listen`. Idempotent.
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_init() {
    ignore_sigpipe();
}

fn create_listener(port: u16) -> Result<c_int, NetError> {
    ignore_sigpipe();

    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(NetError::Socket(io::Error::last_os_error()));
        }

        let opt: c_int = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const c_int as *const c_void,
            std::mem::size_of::<c_int>() as socklen_t,
        );

        let mut addr: libc::sockaddr_in = std::mem::zeroed();
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_addr = libc::in_addr {
            s_addr: libc::INADDR_ANY,
        };
        addr.sin_port = port.to_be();

        if libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(NetError::Bind(err));
        }

        if libc::listen(fd, LISTEN_BACKLOG) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(NetError::Listen(err));
        }

        Ok(fd)
    }
}

fn accept_connection(server_fd: u32) -> Result<c_int, NetError> {
    let fd = unsafe {
        libc::accept(
            server_fd as c_int,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if fd < 0 {
        return Err(NetError::Accept(io::Error::last_os_error()));
    }
    Ok(fd)
}

fn receive_once(fd: u32, buf: &mut [u8]) -> Result<usize, NetError> {
    let n = unsafe { libc::read(fd as c_int, buf.as_mut_ptr() as *mut c_void, buf.len()) };
    if n < 0 {
        return Err(NetError::Receive(io::Error::last_os_error()));
    }
    Ok(n as usize)
}

fn send_all(fd: u32, data: &[u8]) -> Result<(), NetError> {
    let mut sent = 0usize;
    while sent < data.len() {
        let n = unsafe {
            libc::write(
                fd as c_int,
                data[sent..].as_ptr() as *const c_void,
                data.len() - sent,
            )
        };
        if n < 0 {
            // Bytes already accepted by the kernel are not reported back.
            return Err(NetError::Send(io::Error::last_os_error()));
        }
        sent += n as usize;
    }
    Ok(())
}

/// Create a stream socket, bind it to all local interfaces on `port` with
/// address reuse enabled, and start listening.
///
/// Returns the listener descriptor, or -1 if an error occurred.
/// On error, a NetError exception is set; a descriptor created before the
/// failing step has already been closed.
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_tcp_listen(port: u16) -> i64 {
    match create_listener(port) {
        Ok(fd) => {
            debug!(port, fd, "tcp listener bound");
            fd as i64
        }
        Err(e) => {
            throw_net_error(e);
            -1
        }
    }
}

/// Block until a peer connects to the listener.
///
/// Returns a new descriptor for the accepted connection, or -1 if an error
/// occurred. On error, a NetError exception is set.
///
/// There is no timeout. Closing the listener from another thread may or may
/// not unblock a pending accept; that behavior is platform-dependent and
/// unspecified.
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_tcp_accept(server_fd: u32) -> i64 {
    match accept_connection(server_fd) {
        Ok(fd) => {
            trace!(server_fd, fd, "tcp connection accepted");
            fd as i64
        }
        Err(e) => {
            throw_net_error(e);
            -1
        }
    }
}

/// Perform exactly one blocking read of up to 65536 bytes.
///
/// Returns whatever bytes arrived as a string, or null if an error occurred
/// (with a NetError exception set). Zero bytes signals an orderly peer
/// shutdown and is returned as an empty string, not an error. A single call
/// may return a partial message; this primitive never loops or aggregates.
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_tcp_recv(fd: u32) -> *mut OpalString {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    match receive_once(fd, &mut buf) {
        Ok(n) => unsafe { opal_string_new(buf.as_ptr(), n) },
        Err(e) => {
            throw_net_error(e);
            std::ptr::null_mut()
        }
    }
}

/// Write the full byte length of `data`, looping until the kernel has
/// accepted every byte.
///
/// Returns 0 on success, or -1 if an error occurred (with a NetError
/// exception set). The loop aborts on the first failing write; the count of
/// bytes sent before the failure is not reported. Data is length-delimited,
/// so embedded zero bytes are sent.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opal_net_tcp_send(fd: u32, data: *const OpalString) -> i64 {
    let bytes: &[u8] = if data.is_null() {
        &[]
    } else {
        unsafe { (*data).as_bytes() }
    };

    match send_all(fd, bytes) {
        Ok(()) => 0,
        Err(e) => {
            throw_net_error(e);
            -1
        }
    }
}

/// Release the descriptor. Never fails observably. Not idempotent once the
/// OS has reassigned the descriptor; calling it twice on a reused value is a
/// caller error this bridge does not guard against.
#[unsafe(no_mangle)]
pub extern "C" fn opal_net_tcp_close(fd: u32) {
    unsafe {
        libc::close(fd as c_int);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_std_core::{
        opal_exception_check, opal_exception_clear, opal_exception_is_type, opal_string_decref,
        EXCEPTION_TYPE_NET_ERROR,
    };
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    /// Look up the port an ephemeral listener actually bound.
    fn local_port(fd: u32) -> u16 {
        unsafe {
            let mut addr: libc::sockaddr_in = std::mem::zeroed();
            let mut len = std::mem::size_of::<libc::sockaddr_in>() as socklen_t;
            let rc = libc::getsockname(
                fd as c_int,
                &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut len,
            );
            assert_eq!(rc, 0, "getsockname failed");
            u16::from_be(addr.sin_port)
        }
    }

    unsafe fn recv_bytes(fd: u32) -> Vec<u8> {
        let s = opal_net_tcp_recv(fd);
        assert!(!s.is_null(), "recv failed unexpectedly");
        let bytes = unsafe { (*s).as_bytes().to_vec() };
        unsafe { opal_string_decref(s) };
        bytes
    }

    #[test]
    fn test_listen_and_close() {
        let fd = opal_net_tcp_listen(0);
        assert!(fd >= 0, "Failed to create listener");
        assert!(local_port(fd as u32) > 0);
        opal_net_tcp_close(fd as u32);
    }

    #[test]
    fn test_bind_port_already_in_use() {
        let first = opal_net_tcp_listen(0);
        assert!(first >= 0);
        let port = local_port(first as u32);

        let second = opal_net_tcp_listen(port);
        assert_eq!(second, -1, "Second bind of a live port should fail");
        assert_eq!(opal_exception_check(), 1);
        assert_eq!(opal_exception_is_type(EXCEPTION_TYPE_NET_ERROR), 1);
        opal_exception_clear();

        opal_net_tcp_close(first as u32);
    }

    #[test]
    fn test_send_recv_roundtrip_and_orderly_shutdown() {
        let listener = opal_net_tcp_listen(0);
        assert!(listener >= 0);
        let port = local_port(listener as u32);

        // Payload includes an embedded zero byte; the bridge is
        // length-delimited and must preserve it.
        let request: &[u8] = b"hello \0 bridge";
        let reply: &[u8] = b"hello back";

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream.write_all(request).unwrap();

            let mut got = Vec::new();
            let mut buf = [0u8; 1024];
            while got.len() < reply.len() {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "peer closed before full reply");
                got.extend_from_slice(&buf[..n]);
            }
            assert_eq!(got, reply);
            // Dropping the stream performs the orderly shutdown the server
            // observes as an empty receive.
        });

        let conn = opal_net_tcp_accept(listener as u32);
        assert!(conn >= 0, "accept failed");
        let conn = conn as u32;

        let mut received = Vec::new();
        while received.len() < request.len() {
            let chunk = unsafe { recv_bytes(conn) };
            assert!(!chunk.is_empty(), "peer closed before full request");
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, request);

        unsafe {
            let reply_str = opal_string_new(reply.as_ptr(), reply.len());
            assert_eq!(opal_net_tcp_send(conn, reply_str), 0);
            opal_string_decref(reply_str);
        }

        client.join().unwrap();

        let after_close = unsafe { recv_bytes(conn) };
        assert!(
            after_close.is_empty(),
            "orderly shutdown must yield empty text, not an error"
        );

        opal_net_tcp_close(conn);
        opal_net_tcp_close(listener as u32);
    }

    #[test]
    fn test_send_null_data_is_noop() {
        let listener = opal_net_tcp_listen(0);
        assert!(listener >= 0);
        let port = local_port(listener as u32);

        let client = thread::spawn(move || {
            let _stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            thread::sleep(Duration::from_millis(50));
        });

        let conn = opal_net_tcp_accept(listener as u32);
        assert!(conn >= 0);

        let rc = unsafe { opal_net_tcp_send(conn as u32, std::ptr::null()) };
        assert_eq!(rc, 0);

        client.join().unwrap();
        opal_net_tcp_close(conn as u32);
        opal_net_tcp_close(listener as u32);
    }

    #[test]
    fn test_concurrent_accepts_get_distinct_handles() {
        let listener = opal_net_tcp_listen(0);
        assert!(listener >= 0);
        let port = local_port(listener as u32);
        let server_fd = listener as u32;

        let acceptors: Vec<_> = (0..2)
            .map(|_| thread::spawn(move || opal_net_tcp_accept(server_fd)))
            .collect();

        thread::sleep(Duration::from_millis(50));
        let _c1 = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let _c2 = TcpStream::connect(("127.0.0.1", port)).unwrap();

        let fds: Vec<i64> = acceptors.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(fds.iter().all(|&fd| fd >= 0));
        assert_ne!(fds[0], fds[1], "accepted handles must not alias");

        for fd in fds {
            opal_net_tcp_close(fd as u32);
        }
        opal_net_tcp_close(server_fd);
    }

    #[test]
    fn test_recv_invalid_descriptor() {
        // A descriptor far above any open fd in the test process.
        let result = opal_net_tcp_recv(0x3FFF_FFFF);
        assert!(result.is_null(), "recv on a bad fd should fail");
        assert_eq!(opal_exception_is_type(EXCEPTION_TYPE_NET_ERROR), 1);
        opal_exception_clear();
    }
}
