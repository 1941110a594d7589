use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use super::sockaddr::SockAddr;
use super::{Endpoint, ProbeError, RECV_TIMEOUT};

/// A raw `AF_INET`/`IPPROTO_ICMP` socket. Received datagrams include the
/// IPv4 header.
pub struct RawSocket {
    socket: AtomicI32,
}

impl RawSocket {
    /// Open the socket and set its receive timeout to [`RECV_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// [`ProbeError::PermissionDenied`] when the process lacks the privilege
    /// to open raw sockets, [`ProbeError::SocketOpenFailed`] otherwise.
    pub fn open() -> Result<RawSocket, ProbeError> {
        let socket = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_ICMP) };
        if socket < 0 {
            let err = std::io::Error::last_os_error();
            return Err(match err.kind() {
                std::io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied(err),
                _ => ProbeError::SocketOpenFailed(err),
            });
        }
        log::debug!("opened raw ICMP socket, fd {}", socket);

        let sock = RawSocket {
            socket: AtomicI32::new(socket),
        };
        sock.set_recv_timeout(RECV_TIMEOUT)
            .map_err(ProbeError::SocketOpenFailed)?;
        log::debug!("receive timeout set to {:?}", RECV_TIMEOUT);
        Ok(sock)
    }

    /// A zero `timeval` would block forever, so `timeout` is rounded up to
    /// at least one microsecond.
    fn set_recv_timeout(&self, timeout: Duration) -> Result<(), std::io::Error> {
        let timeout = timeout.max(Duration::from_micros(1));
        let timeval = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        self.setsockopt(libc::SOL_SOCKET, libc::SO_RCVTIMEO, &timeval)
    }

    fn fd(&self) -> i32 {
        self.socket.load(Ordering::Acquire)
    }

    fn setsockopt<T: Sized>(&self, level: libc::c_int, name: libc::c_int, optval: &T) -> Result<(), std::io::Error> {
        let result = unsafe {
            libc::setsockopt(
                self.fd(),
                level,
                name,
                optval as *const T as *const libc::c_void,
                std::mem::size_of::<T>() as libc::socklen_t,
            )
        };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Endpoint for RawSocket {
    fn send(&self, packet: &[u8], peer: Ipv4Addr) -> Result<(), ProbeError> {
        let target = SockAddr::from(SocketAddrV4::new(peer, 0));
        let result = unsafe {
            libc::sendto(
                self.fd(),
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
                0,
                target.as_ref(),
                SockAddr::LEN,
            )
        };
        match result {
            n if n < 0 => Err(ProbeError::SendFailed(std::io::Error::last_os_error())),
            0 => Err(ProbeError::SendFailed(std::io::ErrorKind::WriteZero.into())),
            _ => Ok(()),
        }
    }

    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<(usize, Ipv4Addr), ProbeError> {
        if timeout.is_zero() {
            return Err(ProbeError::Timeout);
        }
        self.set_recv_timeout(timeout).map_err(ProbeError::RecvFailed)?;
        loop {
            let mut addr = SockAddr::default();
            let mut addr_len = SockAddr::LEN;
            let result = unsafe {
                libc::recvfrom(
                    self.fd(),
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                    0,
                    addr.as_mut(),
                    &mut addr_len,
                )
            };
            if result < 0 {
                let err = std::io::Error::last_os_error();
                return match err.kind() {
                    std::io::ErrorKind::Interrupted => continue,
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Err(ProbeError::Timeout),
                    _ => Err(ProbeError::RecvFailed(err)),
                };
            }
            let source = SocketAddrV4::try_from(addr)
                .map(|addr| *addr.ip())
                .unwrap_or(Ipv4Addr::UNSPECIFIED);
            return Ok((result as usize, source));
        }
    }

    fn close(&self) {
        let socket = self.socket.swap(-1, Ordering::AcqRel);
        if socket >= 0 {
            unsafe {
                libc::close(socket);
            }
            log::debug!("closed raw ICMP socket, fd {}", socket);
        }
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        self.close();
    }
}
