//! Socket Types Module
//!
//! Transport kind, connection direction and address family of a socket.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Transport kind of a socket. Fixed when the socket handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// Connection-oriented ordered byte stream (TCP)
    Stream,
    /// Connectionless message-oriented transport (UDP)
    Datagram,
}

impl SocketType {
    /// Whether this is a stream socket
    pub fn is_stream(self) -> bool {
        self == SocketType::Stream
    }

    /// Whether this is a datagram socket
    pub fn is_datagram(self) -> bool {
        self == SocketType::Datagram
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketType::Stream => write!(f, "stream"),
            SocketType::Datagram => write!(f, "datagram"),
        }
    }
}

/// Role of a socket in a connection.
///
/// A fresh or closed socket has no direction. Binding (and accepting) makes it a
/// server-side socket, connecting makes it a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Not bound or connected
    #[default]
    None,
    /// Bound locally, or accepted on a listening socket
    Server,
    /// Connected to a remote peer
    Client,
}

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl AddressFamily {
    /// Family of an IP address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Family of a textual address, decided by its literal form.
    ///
    /// Anything containing a colon is treated as IPv6; everything else,
    /// including host names, as IPv4.
    pub fn of_literal(addr: &str) -> Self {
        if addr.contains(':') {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        }
    }

    /// The "any interface" address of this family
    pub fn unspecified(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}
