//! Network Interface Module
//!
//! Describes local network interfaces and the collaborator that enumerates them.
//! The socket layer only needs an ordered list of (address, scope) pairs, used to
//! pick a default multicast interface and to resolve IPv6 scope ids.

use std::net::IpAddr;
use std::sync::Arc;

use crate::types::AddressFamily;

/// One address of a local network interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkInterface {
    /// Interface name, e.g. `eth0`
    pub name: String,
    /// Address assigned to the interface
    pub address: IpAddr,
    /// IPv6 scope id (interface index); 0 for IPv4 addresses
    pub scope_id: u32,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, address: IpAddr, scope_id: u32) -> Self {
        Self {
            name: name.into(),
            address,
            scope_id,
        }
    }

    /// Address family of this interface address
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.address)
    }

    /// Whether this is a loopback address
    pub fn is_loopback(&self) -> bool {
        self.address.is_loopback()
    }
}

/// Source of the host's network interfaces.
///
/// Implementations return interfaces in preference order; the first entry of a
/// family is treated as that family's default interface.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceProvider: Send + Sync {
    /// Enumerate interface addresses in preference order
    fn interfaces(&self) -> Vec<NetworkInterface>;
}

impl<P: InterfaceProvider + ?Sized> InterfaceProvider for Arc<P> {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        (**self).interfaces()
    }
}

/// Lookups over an [`InterfaceProvider`]'s list
pub trait InterfaceProviderExt: InterfaceProvider {
    /// First interface address of the given family
    fn default_interface(&self, family: AddressFamily) -> Option<NetworkInterface> {
        self.interfaces()
            .into_iter()
            .find(|iface| iface.family() == family)
    }

    /// Interface owning `address`, if any
    fn find_by_address(&self, address: &IpAddr) -> Option<NetworkInterface> {
        self.interfaces()
            .into_iter()
            .find(|iface| &iface.address == address)
    }

    /// Scope id of the interface called `name`, if any
    fn scope_of_name(&self, name: &str) -> Option<u32> {
        self.interfaces()
            .into_iter()
            .find(|iface| iface.name == name && iface.scope_id != 0)
            .map(|iface| iface.scope_id)
    }
}

impl<P: InterfaceProvider + ?Sized> InterfaceProviderExt for P {}
