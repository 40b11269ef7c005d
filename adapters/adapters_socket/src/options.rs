//! Socket Options Module
//!
//! Address reuse, multicast settings and timeouts of a bound [`SocketHandle`].

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use entities_network::{AddressFamily, InterfaceProviderExt};
use tracing::debug;

use crate::error::SocketError;
use crate::resolver::{scope_id, split_scope};
use crate::socket::SocketHandle;
use crate::transport::{SocketOption, Transport};

/// Apply address reuse, plus port reuse where the platform has it
pub(crate) fn apply_reuse<T: Transport>(transport: &T, descriptor: &T::Descriptor, enabled: bool) -> io::Result<()> {
    transport.set_option(descriptor, SocketOption::ReuseAddress(enabled))?;
    match transport.set_option(descriptor, SocketOption::ReusePort(enabled)) {
        Err(e) if e.kind() == io::ErrorKind::Unsupported => Ok(()),
        other => other,
    }
}

/// Outbound multicast interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MulticastInterface {
    V4(Ipv4Addr),
    V6(u32),
}

impl MulticastInterface {
    fn select_option(self) -> SocketOption {
        match self {
            MulticastInterface::V4(addr) => SocketOption::MulticastInterfaceV4(addr),
            MulticastInterface::V6(scope) => SocketOption::MulticastInterfaceV6(scope),
        }
    }
}

fn unresolvable(what: &str) -> SocketError {
    SocketError::Resolution(what.to_string())
}

impl<T: Transport> SocketHandle<T> {
    /// Enable or disable address reuse
    ///
    /// Port reuse is switched together with address reuse on platforms that
    /// support it; both must succeed.
    pub fn set_reuse_address(&self, enabled: bool) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        apply_reuse(&self.transport, descriptor, enabled).map_err(SocketError::option)
    }

    /// Set the multicast TTL (IPv4) or hop limit (IPv6) of outgoing datagrams
    pub fn set_multicast_ttl(&self, ttl: u32) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        self.transport
            .set_option(descriptor, SocketOption::MulticastTtl(ttl))
            .map_err(SocketError::option)
    }

    /// Set read and write timeouts in seconds; `0` blocks indefinitely
    pub fn set_timeout(&self, seconds: u64) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        let timeout = if seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(seconds))
        };
        let read = self.transport.set_option(descriptor, SocketOption::ReadTimeout(timeout));
        let write = self.transport.set_option(descriptor, SocketOption::WriteTimeout(timeout));
        read.and(write).map_err(SocketError::option)
    }

    /// Select the interface outgoing multicast datagrams leave through
    ///
    /// # Arguments
    ///
    /// * `interface_address` - Interface address (IPv6 may carry `%scope`);
    ///   empty picks the first IPv4 interface
    pub fn set_multicast_interface(&self, interface_address: &str) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        let family = AddressFamily::of_literal(interface_address);
        let interface = self.multicast_interface(family, interface_address)?;
        self.transport
            .set_option(descriptor, interface.select_option())
            .map_err(SocketError::option)
    }

    /// Join a multicast group
    ///
    /// The group is IPv6 when its literal contains a colon. Selecting the
    /// outbound interface and adding the membership are both attempted; a
    /// failure of either fails the call without undoing the other.
    ///
    /// # Arguments
    ///
    /// * `multicast_address` - Group address literal
    /// * `interface_address` - Local interface to join on; empty picks the
    ///   first interface of the group's family
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Joined
    /// * `Err(SocketError::Resolution)` - Group or interface could not be determined
    /// * `Err(SocketError::SetOption)` - The platform refused
    pub fn join_group(&self, multicast_address: &str, interface_address: &str) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        let family = AddressFamily::of_literal(multicast_address);
        let (group, _) = split_scope(multicast_address.trim());
        let interface = self.multicast_interface(family, interface_address)?;

        let join = match interface {
            MulticastInterface::V4(interface) => {
                let group: Ipv4Addr = group.parse().map_err(|_| unresolvable(multicast_address))?;
                SocketOption::JoinMulticastV4 { group, interface }
            }
            MulticastInterface::V6(scope) => {
                let group: Ipv6Addr = group.parse().map_err(|_| unresolvable(multicast_address))?;
                SocketOption::JoinMulticastV6 { group, interface: scope }
            }
        };

        let selected = self.transport.set_option(descriptor, interface.select_option());
        if let Err(e) = &selected {
            debug!(?interface, error = %e, "multicast interface selection failed");
        }
        let joined = self.transport.set_option(descriptor, join);
        if let Err(e) = &joined {
            debug!(group = multicast_address, error = %e, "multicast join failed");
        }
        selected.and(joined).map_err(SocketError::option)?;
        debug!(group = multicast_address, ?interface, "joined multicast group");
        Ok(())
    }

    fn multicast_interface(&self, family: AddressFamily, interface_address: &str) -> Result<MulticastInterface, SocketError> {
        let interface_address = interface_address.trim();
        if interface_address.is_empty() {
            let iface = self
                .interfaces
                .default_interface(family)
                .ok_or_else(|| SocketError::Resolution(format!("no {:?} interface", family)))?;
            return Ok(match iface.address {
                IpAddr::V4(addr) => MulticastInterface::V4(addr),
                IpAddr::V6(_) => MulticastInterface::V6(iface.scope_id),
            });
        }

        let (host, scope) = split_scope(interface_address);
        match family {
            AddressFamily::Ipv4 => host
                .parse::<Ipv4Addr>()
                .map(MulticastInterface::V4)
                .map_err(|_| unresolvable(interface_address)),
            AddressFamily::Ipv6 => {
                let ip: Ipv6Addr = host.parse().map_err(|_| unresolvable(interface_address))?;
                Ok(MulticastInterface::V6(scope_id(&ip, scope, self.interfaces.as_ref())))
            }
        }
    }
}
