//! Adapters Layer: Network Interface Enumeration
//!
//! Supplies the list of local interface addresses the socket layer consults when
//! it needs a default multicast interface or an IPv6 scope id.
//!
//! ## Overview
//!
//! - **[`HostInterfaces`]**: reads the host's interfaces (`getifaddrs` on Unix)
//! - **[`FixedInterfaces`]**: a caller-supplied list, for embedding and tests
//!
//! Both implement [`entities_network::InterfaceProvider`].
//!
//! ## See Also
//!
//! - [`entities_network`](../entities_network/index.html): `NetworkInterface` and the provider trait
//! - [`adapters_socket`](../adapters_socket/index.html): the consumer

pub mod host;

pub use host::{host_interfaces, FixedInterfaces, HostInterfaces};
