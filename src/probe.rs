//! TCP reachability probe against the local server port.
//!
//! This is the single liveness signal the supervisor trusts: a successful
//! connect means some server owns the port, whether or not we spawned it.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Upper bound on a single probe, so every poll iteration stays cheap.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Returns true iff a TCP connect to `127.0.0.1:port` succeeds within
/// [`CONNECT_TIMEOUT`]. Refused, timed out, and unreachable all read as false.
pub fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok()
}
