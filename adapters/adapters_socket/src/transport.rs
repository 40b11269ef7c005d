//! Transport Module
//!
//! The capability interface a platform's socket primitives are exposed through.
//! The socket handle's state machine, retry loop and packet assembly are written
//! once against [`Transport`]; each platform family supplies one implementation.
//! [`NativeTransport`](crate::native::NativeTransport) covers BSD sockets and
//! Winsock.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use entities_network::{AddressFamily, SocketType};

/// A socket option understood by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// Address-level reuse (`SO_REUSEADDR`)
    ReuseAddress(bool),
    /// Port-level reuse (`SO_REUSEPORT`)
    ReusePort(bool),
    /// Multicast TTL (IPv4) or hop limit (IPv6), chosen by the descriptor's family
    MulticastTtl(u32),
    /// Receive timeout; `None` blocks indefinitely
    ReadTimeout(Option<Duration>),
    /// Send timeout; `None` blocks indefinitely
    WriteTimeout(Option<Duration>),
    /// Outbound IPv4 multicast interface, by address
    MulticastInterfaceV4(Ipv4Addr),
    /// Outbound IPv6 multicast interface, by scope id
    MulticastInterfaceV6(u32),
    /// Join an IPv4 group on the interface with the given address
    JoinMulticastV4 { group: Ipv4Addr, interface: Ipv4Addr },
    /// Join an IPv6 group on the interface with the given scope id
    JoinMulticastV6 { group: Ipv6Addr, interface: u32 },
}

/// Raw socket primitives of one platform family.
///
/// Every call blocks the calling thread. A descriptor is an owned resource;
/// dropping it (or passing it to [`Transport::close`]) releases it exactly once.
/// Platforms without a facility report [`io::ErrorKind::Unsupported`].
#[cfg_attr(test, mockall::automock(type Descriptor = u32;))]
pub trait Transport {
    /// Owned native descriptor
    type Descriptor;

    /// Allocate a descriptor of the given family and kind
    fn open(&self, family: AddressFamily, kind: SocketType) -> io::Result<Self::Descriptor>;

    fn bind(&self, descriptor: &Self::Descriptor, addr: &SocketAddr) -> io::Result<()>;

    /// Mark a bound stream descriptor as accepting connections
    fn listen(&self, descriptor: &Self::Descriptor, backlog: i32) -> io::Result<()>;

    /// Wait for a connection; returns the new descriptor and the peer address
    fn accept(&self, descriptor: &Self::Descriptor) -> io::Result<(Self::Descriptor, SocketAddr)>;

    fn connect(&self, descriptor: &Self::Descriptor, addr: &SocketAddr) -> io::Result<()>;

    /// Address the descriptor is bound to ("get socket name")
    fn local_addr(&self, descriptor: &Self::Descriptor) -> io::Result<SocketAddr>;

    fn send(&self, descriptor: &Self::Descriptor, buf: &[u8]) -> io::Result<usize>;

    fn recv(&self, descriptor: &Self::Descriptor, buf: &mut [u8]) -> io::Result<usize>;

    fn send_to(&self, descriptor: &Self::Descriptor, buf: &[u8], addr: &SocketAddr) -> io::Result<usize>;

    fn recv_from(&self, descriptor: &Self::Descriptor, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    fn set_option(&self, descriptor: &Self::Descriptor, option: SocketOption) -> io::Result<()>;

    /// Shut down and release a descriptor
    fn close(&self, descriptor: Self::Descriptor) -> io::Result<()>;
}
