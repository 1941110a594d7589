mod packet;
mod sockaddr;

#[cfg(target_os = "linux")]
mod linux;

use std::{fmt::Display, net::Ipv4Addr};

#[cfg(target_os = "linux")]
pub use linux::RawSocket;

pub use packet::{build_echo_request, checksum, extract_icmp_view, IcmpType, IcmpView};

/// Size of the ICMP echo header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of the echo payload in bytes.
pub const PAYLOAD_SIZE: usize = 56;

/// Size of an outgoing echo request (header and payload).
pub const PACKET_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

/// Size of an IPv4 header without options.
pub const IP_HEADER_SIZE: usize = 20;

/// Receive buffer size, large enough for any IPv4 options prefix.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Value every payload byte is filled with.
pub const PAYLOAD_FILL: u8 = 0x42;

/// How long a single receive blocks before giving up.
pub const RECV_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// A network endpoint able to exchange ICMP datagrams with an IPv4 peer.
///
/// Both the probe loop and the interrupt handler hold the endpoint, so every
/// operation takes `&self`.
pub trait Endpoint: Send + Sync {
    /// Send a single datagram to `peer`.
    fn send(&self, packet: &[u8], peer: Ipv4Addr) -> Result<(), ProbeError>;

    /// Block until a datagram arrives or `timeout` elapses. Returns the
    /// number of bytes written into `buffer` and the source address.
    ///
    /// # Errors
    ///
    /// [`ProbeError::Timeout`] when nothing arrived within `timeout` (a zero
    /// timeout times out at once), [`ProbeError::RecvFailed`] on any other
    /// failure.
    fn recv(&self, buffer: &mut [u8], timeout: std::time::Duration) -> Result<(usize, Ipv4Addr), ProbeError>;

    /// Release the underlying socket. Calling it more than once is harmless.
    fn close(&self);
}

#[derive(Debug)]
pub enum ProbeError {
    /// The caller may not open raw sockets.
    PermissionDenied(std::io::Error),
    /// The socket could not be opened or configured.
    SocketOpenFailed(std::io::Error),
    SendFailed(std::io::Error),
    /// No datagram arrived within the receive timeout.
    Timeout,
    RecvFailed(std::io::Error),
    /// A received datagram is too short for the header it announces.
    MalformedDatagram { length: usize, required: usize },
    /// Writing probe output failed.
    Output(std::io::Error),
}

impl Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::PermissionDenied(err) | ProbeError::SocketOpenFailed(err) => write!(f, "socket: {}", err),
            ProbeError::SendFailed(err) => write!(f, "sendto: {}", err),
            ProbeError::Timeout => write!(f, "recvfrom: timed out"),
            ProbeError::RecvFailed(err) => write!(f, "recvfrom: {}", err),
            ProbeError::MalformedDatagram { length, required } => {
                write!(f, "malformed datagram: {} bytes, need at least {}", length, required)
            }
            ProbeError::Output(err) => write!(f, "output: {}", err),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::PermissionDenied(err)
            | ProbeError::SocketOpenFailed(err)
            | ProbeError::SendFailed(err)
            | ProbeError::RecvFailed(err)
            | ProbeError::Output(err) => Some(err),
            ProbeError::Timeout | ProbeError::MalformedDatagram { .. } => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Output(err)
    }
}
