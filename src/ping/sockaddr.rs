use std::net::{Ipv4Addr, SocketAddrV4};

pub union SockAddr {
    sa: libc::sockaddr,
    sin: libc::sockaddr_in,
}

impl Default for SockAddr {
    fn default() -> Self {
        SockAddr {
            sa: unsafe { std::mem::zeroed() },
        }
    }
}

impl SockAddr {
    pub fn sa_family(&self) -> libc::sa_family_t {
        unsafe { self.sa.sa_family }
    }

    pub const LEN: libc::socklen_t = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
}

impl AsRef<libc::sockaddr> for SockAddr {
    fn as_ref(&self) -> &libc::sockaddr {
        unsafe { &self.sa }
    }
}

impl AsMut<libc::sockaddr> for SockAddr {
    fn as_mut(&mut self) -> &mut libc::sockaddr {
        unsafe { &mut self.sa }
    }
}

pub trait FromOctets {
    fn from_octets(octets: [u8; 4]) -> Self;
}

impl FromOctets for libc::in_addr {
    fn from_octets(octets: [u8; 4]) -> Self {
        libc::in_addr {
            s_addr: u32::from_be_bytes(octets).to_be(),
        }
    }
}

pub trait AsIpv4Addr {
    fn as_ipv4addr(&self) -> Ipv4Addr;
}

impl AsIpv4Addr for libc::in_addr {
    fn as_ipv4addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from_be(self.s_addr))
    }
}

impl TryFrom<SockAddr> for SocketAddrV4 {
    type Error = String;

    fn try_from(value: SockAddr) -> Result<SocketAddrV4, Self::Error> {
        match value.sa_family() as libc::c_int {
            libc::AF_INET => {
                let sockaddr_in: &libc::sockaddr_in = unsafe { &value.sin };
                let port = u16::from_be(sockaddr_in.sin_port);
                Ok(SocketAddrV4::new(sockaddr_in.sin_addr.as_ipv4addr(), port))
            }
            family => Err(format!("Unhandled address family {}", family)),
        }
    }
}

impl From<SocketAddrV4> for SockAddr {
    fn from(addr: SocketAddrV4) -> Self {
        let sockaddr_in = unsafe {
            libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: addr.port().to_be(),
                sin_addr: libc::in_addr::from_octets(addr.ip().octets()),
                ..std::mem::zeroed()
            }
        };
        SockAddr { sin: sockaddr_in }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_octets() {
        let addr = libc::in_addr::from_octets([192, 168, 1, 1]);
        assert_eq!(addr.s_addr, 0xc0a80101_u32.to_be());
        assert_eq!(addr.as_ipv4addr(), Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_sockaddr_from() {
        let ip = Ipv4Addr::new(127, 0, 0, 1);
        let sockaddr = SockAddr::from(SocketAddrV4::new(ip, 0));
        assert_eq!(sockaddr.sa_family() as libc::c_int, libc::AF_INET);
        unsafe {
            assert_eq!(sockaddr.sin.sin_port, 0);
            assert_eq!(sockaddr.sin.sin_addr.as_ipv4addr(), ip);
        }
    }

    #[test]
    fn test_sockaddr_tryinto() {
        let sockaddr = SockAddr {
            sin: libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: 8443u16.to_be(),
                sin_addr: libc::in_addr::from_octets([10, 0, 0, 254]),
                ..unsafe { std::mem::zeroed() }
            },
        };
        let socket_addr: SocketAddrV4 = sockaddr.try_into().unwrap();
        assert_eq!(socket_addr, SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 254), 8443));
    }

    #[test]
    fn test_sockaddr_unknown_family() {
        let sockaddr = SockAddr::default();
        let result: Result<SocketAddrV4, _> = sockaddr.try_into();
        assert!(result.is_err());
    }
}
