//! Native Transport Module
//!
//! [`Transport`] over the operating system's BSD-socket family API (and Winsock
//! on Windows) through the `socket2` crate.

use std::io::{self, Read};
use std::mem::MaybeUninit;
use std::net::{Shutdown, SocketAddr};

use entities_network::{AddressFamily, SocketType};
use socket2::{Domain, Protocol, SockAddr, Socket as Socket2, Type};

use crate::transport::{SocketOption, Transport};

/// Owned native socket. Dropping it closes the descriptor.
#[derive(Debug)]
pub struct NativeSocket {
    inner: Socket2,
    family: AddressFamily,
}

impl NativeSocket {
    /// The underlying socket2 socket
    pub fn inner(&self) -> &Socket2 {
        &self.inner
    }

    /// Address family the socket was opened with
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    #[cfg(unix)]
    pub fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.inner.as_raw_fd()
    }

    #[cfg(windows)]
    pub fn as_raw_socket(&self) -> std::os::windows::io::RawSocket {
        use std::os::windows::io::AsRawSocket;
        self.inner.as_raw_socket()
    }
}

/// Sockets provided by the host operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTransport;

fn domain_of(family: AddressFamily) -> Domain {
    match family {
        AddressFamily::Ipv4 => Domain::IPV4,
        AddressFamily::Ipv6 => Domain::IPV6,
    }
}

fn type_and_protocol(kind: SocketType) -> (Type, Protocol) {
    match kind {
        SocketType::Stream => (Type::STREAM, Protocol::TCP),
        SocketType::Datagram => (Type::DGRAM, Protocol::UDP),
    }
}

fn to_socket_addr(addr: SockAddr) -> io::Result<SocketAddr> {
    addr.as_socket()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid socket address"))
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &Socket2, reuse: bool) -> io::Result<()> {
    socket.set_reuse_port(reuse)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &Socket2, _reuse: bool) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "SO_REUSEPORT is not available"))
}

impl Transport for NativeTransport {
    type Descriptor = NativeSocket;

    fn open(&self, family: AddressFamily, kind: SocketType) -> io::Result<NativeSocket> {
        let (ty, protocol) = type_and_protocol(kind);
        let inner = Socket2::new(domain_of(family), ty, Some(protocol))?;
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
        inner.set_nosigpipe(true)?;
        Ok(NativeSocket { inner, family })
    }

    fn bind(&self, descriptor: &NativeSocket, addr: &SocketAddr) -> io::Result<()> {
        descriptor.inner.bind(&SockAddr::from(*addr))
    }

    fn listen(&self, descriptor: &NativeSocket, backlog: i32) -> io::Result<()> {
        descriptor.inner.listen(backlog)
    }

    fn accept(&self, descriptor: &NativeSocket) -> io::Result<(NativeSocket, SocketAddr)> {
        let (inner, addr) = descriptor.inner.accept()?;
        let peer = to_socket_addr(addr)?;
        Ok((
            NativeSocket {
                inner,
                family: descriptor.family,
            },
            peer,
        ))
    }

    fn connect(&self, descriptor: &NativeSocket, addr: &SocketAddr) -> io::Result<()> {
        descriptor.inner.connect(&SockAddr::from(*addr))
    }

    fn local_addr(&self, descriptor: &NativeSocket) -> io::Result<SocketAddr> {
        descriptor.inner.local_addr().and_then(to_socket_addr)
    }

    fn send(&self, descriptor: &NativeSocket, buf: &[u8]) -> io::Result<usize> {
        descriptor.inner.send(buf)
    }

    fn recv(&self, descriptor: &NativeSocket, buf: &mut [u8]) -> io::Result<usize> {
        (&descriptor.inner).read(buf)
    }

    fn send_to(&self, descriptor: &NativeSocket, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        descriptor.inner.send_to(buf, &SockAddr::from(*addr))
    }

    fn recv_from(&self, descriptor: &NativeSocket, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        // SAFETY: u8 and MaybeUninit<u8> share a layout, and recv_from only
        // writes initialized bytes into the slice.
        let uninit: &mut [MaybeUninit<u8>] = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };
        let (n, from) = descriptor.inner.recv_from(uninit)?;
        Ok((n, to_socket_addr(from)?))
    }

    fn set_option(&self, descriptor: &NativeSocket, option: SocketOption) -> io::Result<()> {
        let socket = &descriptor.inner;
        match option {
            SocketOption::ReuseAddress(reuse) => socket.set_reuse_address(reuse),
            SocketOption::ReusePort(reuse) => set_reuse_port(socket, reuse),
            SocketOption::MulticastTtl(ttl) => match descriptor.family {
                AddressFamily::Ipv4 => socket.set_multicast_ttl_v4(ttl),
                AddressFamily::Ipv6 => socket.set_multicast_hops_v6(ttl),
            },
            SocketOption::ReadTimeout(timeout) => socket.set_read_timeout(timeout),
            SocketOption::WriteTimeout(timeout) => socket.set_write_timeout(timeout),
            SocketOption::MulticastInterfaceV4(interface) => socket.set_multicast_if_v4(&interface),
            SocketOption::MulticastInterfaceV6(index) => socket.set_multicast_if_v6(index),
            SocketOption::JoinMulticastV4 { group, interface } => {
                socket.join_multicast_v4(&group, &interface)
            }
            SocketOption::JoinMulticastV6 { group, interface } => {
                socket.join_multicast_v6(&group, interface)
            }
        }
    }

    fn close(&self, descriptor: NativeSocket) -> io::Result<()> {
        // Non-blocking so a lingering close cannot stall the caller.
        let _ = descriptor.inner.set_nonblocking(true);
        match descriptor.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::thread;
    use std::time::Duration;

    fn loopback_v4() -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)
    }

    #[test]
    fn test_open_stream_and_datagram() {
        let transport = NativeTransport;
        let stream = transport.open(AddressFamily::Ipv4, SocketType::Stream).unwrap();
        assert_eq!(stream.family(), AddressFamily::Ipv4);
        let dgram = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        assert_eq!(dgram.inner().r#type().unwrap(), Type::DGRAM);
    }

    #[test]
    fn test_bind_and_local_addr() {
        let transport = NativeTransport;
        let socket = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        transport.bind(&socket, &loopback_v4()).unwrap();

        let local = transport.local_addr(&socket).unwrap();
        assert_eq!(local.ip(), Ipv4Addr::LOCALHOST);
        assert!(local.port() > 0);
    }

    #[test]
    fn test_ipv6_bind() {
        let transport = NativeTransport;
        let socket = transport.open(AddressFamily::Ipv6, SocketType::Stream).unwrap();
        // IPv6 may be disabled in the test environment
        if transport
            .bind(&socket, &SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 0))
            .is_ok()
        {
            assert_eq!(transport.local_addr(&socket).unwrap().ip(), Ipv6Addr::LOCALHOST);
        }
    }

    #[test]
    fn test_stream_accept_connect_send_recv() {
        let transport = NativeTransport;
        let listener = transport.open(AddressFamily::Ipv4, SocketType::Stream).unwrap();
        transport.bind(&listener, &loopback_v4()).unwrap();
        transport.listen(&listener, 128).unwrap();
        let addr = transport.local_addr(&listener).unwrap();

        let sender = thread::spawn(move || {
            let transport = NativeTransport;
            let client = transport.open(AddressFamily::Ipv4, SocketType::Stream).unwrap();
            transport.connect(&client, &addr).unwrap();
            assert_eq!(transport.send(&client, b"Hello, Socket!").unwrap(), 14);
            thread::sleep(Duration::from_millis(50));
            transport.close(client).unwrap();
        });

        let (accepted, peer) = transport.accept(&listener).unwrap();
        assert_eq!(peer.ip(), Ipv4Addr::LOCALHOST);
        assert_eq!(accepted.family(), AddressFamily::Ipv4);

        let mut buf = vec![0u8; 100];
        let mut total = 0;
        while total < 14 {
            let n = transport.recv(&accepted, &mut buf[total..]).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(&buf[..total], b"Hello, Socket!");

        sender.join().unwrap();
    }

    #[test]
    fn test_datagram_send_to_recv_from() {
        let transport = NativeTransport;
        let a = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        let b = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        transport.bind(&a, &loopback_v4()).unwrap();
        transport.bind(&b, &loopback_v4()).unwrap();
        let a_addr = transport.local_addr(&a).unwrap();
        let b_addr = transport.local_addr(&b).unwrap();

        assert_eq!(transport.send_to(&a, b"Hello, UDP!", &b_addr).unwrap(), 11);

        let mut buf = [0u8; 64];
        let (n, from) = transport.recv_from(&b, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Hello, UDP!");
        assert_eq!(from, a_addr);
    }

    #[test]
    fn test_recv_from_truncates_to_buffer() {
        let transport = NativeTransport;
        let a = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        let b = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        transport.bind(&b, &loopback_v4()).unwrap();
        let b_addr = transport.local_addr(&b).unwrap();

        transport.send_to(&a, &[7u8; 1000], &b_addr).unwrap();

        let mut buf = [0u8; 100];
        let (n, _) = transport.recv_from(&b, &mut buf).unwrap();
        assert_eq!(n, 100);
        assert!(buf.iter().all(|&byte| byte == 7));
    }

    #[test]
    fn test_listen_on_datagram_fails() {
        let transport = NativeTransport;
        let socket = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        transport.bind(&socket, &loopback_v4()).unwrap();
        assert!(transport.listen(&socket, 128).is_err());
    }

    #[test]
    fn test_connect_refused() {
        let transport = NativeTransport;
        // Bind a listener-less port so nothing is accepting on it
        let idle = transport.open(AddressFamily::Ipv4, SocketType::Stream).unwrap();
        transport.bind(&idle, &loopback_v4()).unwrap();
        let addr = transport.local_addr(&idle).unwrap();

        let client = transport.open(AddressFamily::Ipv4, SocketType::Stream).unwrap();
        assert!(transport.connect(&client, &addr).is_err());
    }

    #[test]
    fn test_set_options() {
        let transport = NativeTransport;
        let socket = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();

        transport.set_option(&socket, SocketOption::ReuseAddress(true)).unwrap();
        assert!(socket.inner().reuse_address().unwrap());
        transport.set_option(&socket, SocketOption::MulticastTtl(3)).unwrap();
        assert_eq!(socket.inner().multicast_ttl_v4().unwrap(), 3);
        transport
            .set_option(&socket, SocketOption::ReadTimeout(Some(Duration::from_secs(2))))
            .unwrap();
        assert_eq!(socket.inner().read_timeout().unwrap(), Some(Duration::from_secs(2)));
        transport.set_option(&socket, SocketOption::ReadTimeout(None)).unwrap();
        assert_eq!(socket.inner().read_timeout().unwrap(), None);
    }

    #[test]
    fn test_multicast_ttl_follows_family() {
        let transport = NativeTransport;
        if let Ok(socket) = transport.open(AddressFamily::Ipv6, SocketType::Datagram) {
            transport.set_option(&socket, SocketOption::MulticastTtl(2)).unwrap();
            assert_eq!(socket.inner().multicast_hops_v6().unwrap(), 2);
        }
    }

    #[test]
    fn test_close_unconnected_is_ok() {
        let transport = NativeTransport;
        let socket = transport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        assert!(transport.close(socket).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_as_raw_fd() {
        let socket = NativeTransport.open(AddressFamily::Ipv4, SocketType::Datagram).unwrap();
        assert!(socket.as_raw_fd() >= 0);
    }
}
