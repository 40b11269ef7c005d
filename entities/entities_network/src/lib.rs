//! Entities Layer: Network
//!
//! Provides the domain types shared by the socket adapters: the transport kind of
//! a socket, the role it plays in a connection, the datagram receipt record, and
//! the network interface description consumed for multicast interface selection.
//!
//! ## Overview
//!
//! The `entities_network` crate has no I/O of its own. It defines:
//! - **[`types`](types/index.html)**: `SocketType`, `Direction` and `AddressFamily`
//! - **[`packet`](packet/index.html)**: `DatagramPacket`, filled by a datagram receive
//! - **[`interface`](interface/index.html)**: `NetworkInterface` and the
//!   `InterfaceProvider` collaborator trait
//!
//! ## Usage
//!
//! ```rust
//! use entities_network::{AddressFamily, DatagramPacket, SocketType};
//!
//! let kind = SocketType::Datagram;
//! assert!(!kind.is_stream());
//!
//! let family = AddressFamily::of_literal("ff02::1");
//! assert_eq!(family, AddressFamily::Ipv6);
//!
//! let packet = DatagramPacket::new();
//! assert!(packet.data().is_empty());
//! ```
//!
//! ## See Also
//!
//! - [`adapters_socket`](../adapters_socket/index.html): socket handle built on these types
//! - [`adapters_net_interfaces`](../adapters_net_interfaces/index.html): host interface enumeration

pub mod interface;
pub mod packet;
pub mod types;

pub use interface::{InterfaceProvider, InterfaceProviderExt, NetworkInterface};
pub use packet::DatagramPacket;
pub use types::{AddressFamily, Direction, SocketType};
