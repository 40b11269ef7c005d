//! Adapters Layer: Socket Abstraction
//!
//! Provides one blocking socket handle for TCP (unicast control), UDP (unicast)
//! and UDP multicast (discovery and notification) under a device-to-device
//! protocol stack. Platform socket APIs sit behind the [`Transport`] trait;
//! [`NativeTransport`] implements it with the `socket2` crate.
//!
//! ## Overview
//!
//! The `adapters_socket` crate provides:
//! - **Lifecycle**: handles share a process-wide [`NetSubsystem`]; creating the
//!   first handle starts it and dropping the last one stops it
//! - **Connections**: bind, listen, accept and connect on a [`SocketHandle`]
//! - **I/O**: read, write with retries, line reads, datagram send and receive
//! - **Options**: address reuse, multicast TTL, timeouts, group membership
//! - **Secure channel**: optional TLS client session over a stream socket
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adapters_socket::{SocketHandle, SocketType};
//! use entities_network::DatagramPacket;
//!
//! let mut receiver = SocketHandle::new(SocketType::Datagram);
//! receiver.bind(9999, "127.0.0.1", false, true).unwrap();
//!
//! let mut sender = SocketHandle::new(SocketType::Datagram);
//! sender.send_to("127.0.0.1", 9999, b"PING").unwrap();
//!
//! let mut packet = DatagramPacket::new();
//! receiver.receive(&mut packet).unwrap();
//! assert_eq!(packet.data(), b"PING");
//! ```
//!
//! ## Architecture
//!
//! This crate is part of the adapters layer in the CLEAN architecture
//! implementation. It depends on:
//! - `entities_network`: socket kinds, datagram packets, the interface provider trait
//! - `adapters_net_interfaces`: the host's interface list
//!
//! ## See Also
//!
//! - [`entities_network`](../entities_network/index.html): domain types
//! - [`adapters_net_interfaces`](../adapters_net_interfaces/index.html): interface enumeration

pub mod config;
pub mod connection;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod native;
pub mod options;
pub mod resolver;
pub mod secure;
pub mod socket;
pub mod transport;

pub use config::SocketConfig;
pub use connection::MAX_BACKLOG;
pub use entities_network::{AddressFamily, DatagramPacket, Direction, SocketType};
pub use error::SocketError;
pub use lifecycle::{NetSubsystem, SubsystemGuard};
pub use native::{NativeSocket, NativeTransport};
pub use resolver::{resolve, ResolveMode};
pub use secure::{SecureConfig, SecureSession};
pub use socket::SocketHandle;
pub use transport::{SocketOption, Transport};
