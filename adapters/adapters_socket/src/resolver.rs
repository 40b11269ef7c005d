//! Address Resolver Module
//!
//! Turns a textual address and port into a socket address. Numeric literals are
//! parsed directly; anything else goes through the system resolver.
//!
//! Two modes are supported:
//! - **Bind**: an empty address means "any IPv4 interface"
//! - **Peer**: the address must name one concrete remote host
//!
//! IPv6 literals may carry a `%scope` suffix, either a numeric interface index
//! or an interface name. Without one, the scope is taken from the local
//! interface that owns the address, so link-local binds work unadorned.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, ToSocketAddrs};

use entities_network::{InterfaceProvider, InterfaceProviderExt};
use tracing::debug;

use crate::error::SocketError;

/// How an address is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Local address to bind; empty means any interface
    Bind,
    /// Remote peer to connect or send to
    Peer,
}

/// Split `fe80::1%eth0` into `("fe80::1", Some("eth0"))`
pub fn split_scope(address: &str) -> (&str, Option<&str>) {
    match address.split_once('%') {
        Some((host, scope)) if !scope.is_empty() => (host, Some(scope)),
        Some((host, _)) => (host, None),
        None => (address, None),
    }
}

/// Scope id for an IPv6 address.
///
/// A numeric suffix is used as is, a name is looked up among the local
/// interfaces, and without a suffix the interface owning the address decides.
pub fn scope_id(ip: &Ipv6Addr, scope: Option<&str>, interfaces: &dyn InterfaceProvider) -> u32 {
    match scope {
        Some(scope) => match scope.parse::<u32>() {
            Ok(index) => index,
            Err(_) => interfaces.scope_of_name(scope).unwrap_or(0),
        },
        None => interfaces
            .find_by_address(&IpAddr::V6(*ip))
            .map(|iface| iface.scope_id)
            .unwrap_or(0),
    }
}

/// Resolve `address`:`port` into a socket address
///
/// # Arguments
///
/// * `address` - Numeric address, host name, or (bind mode only) empty
/// * `port` - Port number
/// * `mode` - Bind or peer resolution
/// * `interfaces` - Local interfaces, consulted for IPv6 scope ids
///
/// # Returns
///
/// * `Ok(SocketAddr)` - First resolved address
/// * `Err(SocketError::Resolution)` - Nothing usable could be resolved
pub fn resolve(
    address: &str,
    port: u16,
    mode: ResolveMode,
    interfaces: &dyn InterfaceProvider,
) -> Result<SocketAddr, SocketError> {
    let address = address.trim();
    if address.is_empty() {
        return match mode {
            ResolveMode::Bind => Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)),
            ResolveMode::Peer => Err(SocketError::Resolution(format!("empty address:{}", port))),
        };
    }

    let (host, scope) = split_scope(address);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let resolved = match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => SocketAddr::new(IpAddr::V4(ip), port),
        Ok(IpAddr::V6(ip)) => {
            SocketAddr::V6(SocketAddrV6::new(ip, port, 0, scope_id(&ip, scope, interfaces)))
        }
        Err(_) => lookup_host(host, port)?,
    };

    if mode == ResolveMode::Peer && resolved.ip().is_unspecified() {
        return Err(SocketError::Resolution(format!("{}:{} is not a concrete peer", address, port)));
    }
    Ok(resolved)
}

fn lookup_host(host: &str, port: u16) -> Result<SocketAddr, SocketError> {
    let mut addrs = (host, port).to_socket_addrs().map_err(|e| {
        debug!(host, port, error = %e, "host lookup failed");
        SocketError::Resolution(format!("{}:{}", host, port))
    })?;
    addrs
        .next()
        .ok_or_else(|| SocketError::Resolution(format!("{}:{}", host, port)))
}
