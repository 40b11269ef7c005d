//! Connection Module
//!
//! Moves a [`SocketHandle`] between its states:
//!
//! ```text
//! Unbound --bind--> Bound (server) --listen/accept--> ...
//! Unbound --connect--> Connected (client)
//! any --close--> Unbound
//! ```

use std::net::SocketAddr;

use entities_network::{AddressFamily, Direction};
use tracing::debug;

use crate::error::SocketError;
use crate::options::apply_reuse;
use crate::resolver::{resolve, ResolveMode};
use crate::secure::SecureSession;
use crate::socket::SocketHandle;
use crate::transport::Transport;

/// Largest pending-connection queue the platform accepts
#[cfg(unix)]
pub const MAX_BACKLOG: i32 = libc::SOMAXCONN as i32;
#[cfg(not(unix))]
pub const MAX_BACKLOG: i32 = 0x7fff_ffff;

/// Validate a caller-supplied port number
pub(crate) fn checked_port(port: i32) -> Result<u16, SocketError> {
    match u16::try_from(port) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SocketError::InvalidArgument(format!("port {} out of range", port))),
    }
}

impl<T: Transport> SocketHandle<T> {
    /// Bind the socket to a local address
    ///
    /// An already bound handle is closed first.
    ///
    /// # Arguments
    ///
    /// * `port` - Local port, 1..=65535
    /// * `address` - Local address; empty binds every IPv4 interface
    /// * `wildcard` - Bind every interface of `address`'s family instead of
    ///   `address` itself (multicast receivers)
    /// * `reuse` - Enable address (and port) reuse before binding
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Bound; direction is `Server`
    /// * `Err(SocketError)` - Handle is left unbound
    pub fn bind(&mut self, port: i32, address: &str, wildcard: bool, reuse: bool) -> Result<(), SocketError> {
        let port = checked_port(port)?;
        let resolved = resolve(address, port, ResolveMode::Bind, self.interfaces.as_ref())?;
        let family = AddressFamily::of(&resolved.ip());
        let target = if wildcard {
            SocketAddr::new(family.unspecified(), port)
        } else {
            resolved
        };

        self.close();

        let descriptor = self.open_descriptor(family)?;
        if reuse {
            if let Err(e) = apply_reuse(&self.transport, &descriptor, true) {
                debug!(%target, error = %e, "address reuse failed");
                self.discard(descriptor);
                return Err(SocketError::bind(e));
            }
        }
        if let Err(e) = self.transport.bind(&descriptor, &target) {
            debug!(%target, error = %e, "bind failed");
            self.discard(descriptor);
            return Err(SocketError::bind(e));
        }

        self.descriptor = Some(descriptor);
        self.local_port = Some(port);
        self.local_address = if address.trim().is_empty() {
            resolved.ip().to_string()
        } else {
            address.to_string()
        };
        self.direction = Direction::Server;
        debug!(kind = %self.kind, %target, "socket bound");
        Ok(())
    }

    /// Start accepting connections on a bound stream socket
    pub fn listen(&mut self) -> Result<(), SocketError> {
        if !self.kind.is_stream() {
            return Err(SocketError::InvalidArgument("listen on a datagram socket".to_string()));
        }
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| SocketError::InvalidArgument("listen on an unbound socket".to_string()))?;
        self.transport
            .listen(descriptor, MAX_BACKLOG)
            .map_err(|e| SocketError::Listen(e.to_string()))?;
        debug!(address = %self.local_address, port = ?self.local_port, "socket listening");
        Ok(())
    }

    /// Wait for a connection and hand it to `client`
    ///
    /// Any descriptor `client` held is closed. The accepted socket takes the
    /// server's port and its own local address, and is marked `Server`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - `client` holds the accepted connection
    /// * `Err(SocketError::Accept)` - Nothing was accepted
    pub fn accept(&self, client: &mut SocketHandle<T>) -> Result<(), SocketError> {
        let descriptor = self.bound_descriptor()?;
        let (accepted, peer) = self.transport.accept(descriptor).map_err(|e| {
            debug!(error = %e, "accept failed");
            SocketError::Accept(e.to_string())
        })?;

        client.close();
        let local = self.transport.local_addr(&accepted).ok();
        client.descriptor = Some(accepted);
        client.local_address = match local {
            Some(local) => local.ip().to_string(),
            None => self.local_address.clone(),
        };
        client.local_port = self.local_port;
        client.direction = Direction::Server;
        debug!(%peer, "connection accepted");
        Ok(())
    }

    /// Connect to a remote peer
    ///
    /// Allocates a descriptor when the handle is unbound. Secure variants run
    /// the TLS handshake once the connection is up. The handle is marked
    /// `Client` whether or not the connection succeeds, except when resolving
    /// the peer or allocating the descriptor fails: the handle is then left
    /// untouched, direction included.
    ///
    /// # Arguments
    ///
    /// * `address` - Peer host name or numeric address
    /// * `port` - Peer port
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Connected; local address and port are known
    /// * `Err(SocketError)` - Resolution, connect or handshake failure
    pub fn connect(&mut self, address: &str, port: i32) -> Result<(), SocketError> {
        let port = checked_port(port)?;
        let peer = resolve(address, port, ResolveMode::Peer, self.interfaces.as_ref())?;

        let allocated = self.descriptor.is_none();
        if allocated {
            self.descriptor = Some(self.open_descriptor(AddressFamily::of(&peer.ip()))?);
        }
        self.direction = Direction::Client;

        let outcome = match self.descriptor.as_ref() {
            Some(descriptor) => self
                .transport
                .connect(descriptor, &peer)
                .and_then(|()| self.transport.local_addr(descriptor)),
            None => return Err(SocketError::NotBound),
        };
        let local = match outcome {
            Ok(local) => local,
            Err(e) => {
                debug!(%peer, error = %e, "connect failed");
                if allocated {
                    if let Some(descriptor) = self.descriptor.take() {
                        self.discard(descriptor);
                    }
                }
                return Err(SocketError::Connect(e.to_string()));
            }
        };
        self.local_address = local.ip().to_string();
        self.local_port = Some(local.port());

        if let Some(secure) = self.secure.as_ref() {
            let session = match self.descriptor.as_ref() {
                Some(descriptor) => SecureSession::handshake(secure, &self.transport, descriptor),
                None => Err(SocketError::NotBound),
            };
            match session {
                Ok(session) => self.secure_session = Some(session),
                Err(e) => {
                    debug!(%peer, error = %e, "secure handshake failed");
                    self.close();
                    return Err(e);
                }
            }
        }

        debug!(%peer, %local, secure = self.secure_session.is_some(), "socket connected");
        Ok(())
    }
}
