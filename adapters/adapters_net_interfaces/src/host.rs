//! Host Interfaces Module
//!
//! Enumerates the addresses of the host's active network interfaces.

use entities_network::{InterfaceProvider, NetworkInterface};
use tracing::debug;

/// Interfaces of the running host, read on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInterfaces;

impl InterfaceProvider for HostInterfaces {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        host_interfaces()
    }
}

/// A fixed list of interfaces, returned as given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedInterfaces(pub Vec<NetworkInterface>);

impl FixedInterfaces {
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self(interfaces)
    }
}

impl InterfaceProvider for FixedInterfaces {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        self.0.clone()
    }
}

/// Addresses of all interfaces that are up.
///
/// Non-loopback addresses come first so that the first entry of a family is a
/// usable default for multicast. Returns an empty list when enumeration fails.
#[cfg(unix)]
pub fn host_interfaces() -> Vec<NetworkInterface> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::InterfaceFlags;
    use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};

    let addrs = match getifaddrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            debug!(error = %err, "getifaddrs failed");
            return Vec::new();
        }
    };

    let mut interfaces = Vec::new();
    for ifaddr in addrs {
        if !ifaddr.flags.contains(InterfaceFlags::IFF_UP) {
            continue;
        }
        let Some(storage) = ifaddr.address else {
            continue;
        };

        if let Some(sin) = storage.as_sockaddr_in() {
            let v4 = SocketAddrV4::from(*sin);
            interfaces.push(NetworkInterface::new(
                ifaddr.interface_name.clone(),
                IpAddr::V4(*v4.ip()),
                0,
            ));
        } else if let Some(sin6) = storage.as_sockaddr_in6() {
            let v6 = SocketAddrV6::from(*sin6);
            let scope_id = if v6.scope_id() != 0 {
                v6.scope_id()
            } else {
                nix::net::if_::if_nametoindex(ifaddr.interface_name.as_str()).unwrap_or(0)
            };
            interfaces.push(NetworkInterface::new(
                ifaddr.interface_name.clone(),
                IpAddr::V6(*v6.ip()),
                scope_id,
            ));
        }
    }

    interfaces.sort_by_key(|iface| iface.is_loopback());
    interfaces
}

/// Interface enumeration is not available on this platform.
#[cfg(not(unix))]
pub fn host_interfaces() -> Vec<NetworkInterface> {
    debug!("interface enumeration not supported on this platform");
    Vec::new()
}
