//! Socket Module
//!
//! The socket handle: one native descriptor plus the metadata the protocol
//! stack tracks for it. Connection, I/O and option operations live in their own
//! modules as further `impl` blocks on [`SocketHandle`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use adapters_net_interfaces::HostInterfaces;
use entities_network::{AddressFamily, Direction, InterfaceProvider, SocketType};
use tracing::debug;

use crate::config::SocketConfig;
use crate::error::SocketError;
use crate::lifecycle::{NetSubsystem, SubsystemGuard};
use crate::native::NativeTransport;
use crate::secure::{SecureConfig, SecureSession};
use crate::transport::Transport;

/// Socket handle
///
/// Created unbound. Binding makes it a server-side socket, connecting makes it a
/// client; [`SocketHandle::close`] (or dropping the handle) returns it to the
/// unbound state. A handle holds the descriptor exclusively and is driven by one
/// thread at a time.
pub struct SocketHandle<T: Transport = NativeTransport> {
    pub(crate) descriptor: Option<T::Descriptor>,
    pub(crate) kind: SocketType,
    pub(crate) direction: Direction,
    pub(crate) local_address: String,
    pub(crate) local_port: Option<u16>,
    pub(crate) secure: Option<SecureConfig>,
    pub(crate) secure_session: Option<SecureSession>,
    pub(crate) config: SocketConfig,
    pub(crate) interfaces: Arc<dyn InterfaceProvider>,
    pub(crate) transport: T,
    _subsystem: SubsystemGuard,
}

impl SocketHandle<NativeTransport> {
    /// Create an unbound socket on the host's native sockets
    ///
    /// # Arguments
    ///
    /// * `kind` - Stream (TCP) or Datagram (UDP)
    pub fn new(kind: SocketType) -> Self {
        Self::with_transport(kind, NativeTransport)
    }

    /// Create an unbound stream socket that runs a TLS handshake on connect
    pub fn new_secure(kind: SocketType, secure: SecureConfig) -> Self {
        Self::new(kind).with_secure(secure)
    }
}

impl<T: Transport> SocketHandle<T> {
    /// Create an unbound socket over the given transport
    ///
    /// The handle registers itself with the process-wide network subsystem and
    /// reads its tunables from [`SocketConfig::process_default`].
    pub fn with_transport(kind: SocketType, transport: T) -> Self {
        Self {
            descriptor: None,
            kind,
            direction: Direction::None,
            local_address: String::new(),
            local_port: None,
            secure: None,
            secure_session: None,
            config: SocketConfig::process_default().clone(),
            interfaces: Arc::new(HostInterfaces),
            transport,
            _subsystem: NetSubsystem::global().startup(),
        }
    }

    /// Replace the socket's tunables
    pub fn with_config(mut self, config: SocketConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the interface list consulted for multicast and IPv6 scopes
    pub fn with_interfaces(mut self, interfaces: Arc<dyn InterfaceProvider>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Run a TLS handshake with these settings after every connect
    pub fn with_secure(mut self, secure: SecureConfig) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn kind(&self) -> SocketType {
        self.kind
    }

    pub fn is_stream(&self) -> bool {
        self.kind.is_stream()
    }

    pub fn is_datagram(&self) -> bool {
        self.kind.is_datagram()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the handle holds a descriptor
    pub fn is_bound(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Local address as given at bind time, or as reported after connect/accept.
    /// Empty when unbound.
    pub fn address(&self) -> &str {
        &self.local_address
    }

    /// Local port; `None` when unbound
    pub fn port(&self) -> Option<u16> {
        self.local_port
    }

    /// Whether this is a secure variant
    pub fn is_secure(&self) -> bool {
        self.secure.is_some()
    }

    /// Whether a TLS session is currently established
    pub fn has_secure_session(&self) -> bool {
        self.secure_session.is_some()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The native descriptor, if bound
    pub fn descriptor(&self) -> Option<&T::Descriptor> {
        self.descriptor.as_ref()
    }

    /// Local socket address as reported by the operating system
    pub fn local_socket_addr(&self) -> Result<SocketAddr, SocketError> {
        let descriptor = self.bound_descriptor()?;
        Ok(self.transport.local_addr(descriptor)?)
    }

    /// Close the socket.
    ///
    /// Ends the TLS session (if any), releases the descriptor and resets the
    /// address, port and direction. Failures while releasing are logged; the
    /// handle is unbound afterwards either way. Closing an unbound handle is a
    /// no-op.
    pub fn close(&mut self) {
        let descriptor = self.descriptor.take();
        if let (Some(session), Some(descriptor)) = (self.secure_session.take(), descriptor.as_ref()) {
            session.close(&self.transport, descriptor);
        }
        if let Some(descriptor) = descriptor {
            if let Err(e) = self.transport.close(descriptor) {
                debug!(error = %e, "error while closing socket");
            }
            debug!(kind = %self.kind, address = %self.local_address, port = ?self.local_port, "socket closed");
        }
        self.local_address.clear();
        self.local_port = None;
        self.direction = Direction::None;
    }

    pub(crate) fn bound_descriptor(&self) -> Result<&T::Descriptor, SocketError> {
        self.descriptor.as_ref().ok_or(SocketError::NotBound)
    }

    /// Allocate a descriptor of this handle's kind
    pub(crate) fn open_descriptor(&self, family: AddressFamily) -> Result<T::Descriptor, SocketError> {
        self.transport.open(family, self.kind).map_err(|e| {
            debug!(kind = %self.kind, ?family, error = %e, "socket allocation failed");
            SocketError::Allocation(e.to_string())
        })
    }

    /// Release a descriptor that never made it into the handle
    pub(crate) fn discard(&self, descriptor: T::Descriptor) {
        if let Err(e) = self.transport.close(descriptor) {
            debug!(error = %e, "error while discarding socket");
        }
    }
}

impl<T: Transport> Drop for SocketHandle<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> fmt::Debug for SocketHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .field("bound", &self.descriptor.is_some())
            .field("address", &self.local_address)
            .field("port", &self.local_port)
            .field("secure", &self.secure.is_some())
            .finish_non_exhaustive()
    }
}
