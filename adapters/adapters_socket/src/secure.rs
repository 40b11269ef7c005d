//! Secure Channel Module
//!
//! TLS client session layered over a connected stream descriptor. Record
//! traffic goes through the handle's [`Transport`], so a secure socket behaves
//! the same on every platform and under test transports.

use std::io::{self, Read, Write};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use tracing::debug;

use crate::error::SocketError;
use crate::transport::Transport;

/// Caller-supplied TLS settings for a secure socket
#[derive(Debug, Clone)]
pub struct SecureConfig {
    pub client: Arc<ClientConfig>,
    /// Name the peer certificate is verified against
    pub server_name: ServerName<'static>,
}

impl SecureConfig {
    /// Create settings verifying the peer as `server_name`
    ///
    /// # Arguments
    ///
    /// * `client` - rustls client configuration
    /// * `server_name` - DNS name or IP literal expected in the peer certificate
    ///
    /// # Returns
    ///
    /// * `Ok(SecureConfig)` - Settings
    /// * `Err(SocketError::InvalidArgument)` - `server_name` is not a valid name
    pub fn new(client: Arc<ClientConfig>, server_name: &str) -> Result<Self, SocketError> {
        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|e| SocketError::InvalidArgument(format!("server name {}: {}", server_name, e)))?;
        Ok(Self { client, server_name })
    }
}

/// Read/Write view of a descriptor through its transport
struct DescriptorIo<'a, T: Transport> {
    transport: &'a T,
    descriptor: &'a T::Descriptor,
}

impl<T: Transport> Read for DescriptorIo<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.transport.recv(self.descriptor, buf)
    }
}

impl<T: Transport> Write for DescriptorIo<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transport.send(self.descriptor, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An established TLS client session
#[derive(Debug)]
pub struct SecureSession {
    conn: ClientConnection,
    /// Plaintext accepted into records that are not fully sent yet
    pending: Option<usize>,
}

impl SecureSession {
    /// Run the client handshake over a freshly connected descriptor
    pub(crate) fn handshake<T: Transport>(
        config: &SecureConfig,
        transport: &T,
        descriptor: &T::Descriptor,
    ) -> Result<Self, SocketError> {
        let mut conn = ClientConnection::new(config.client.clone(), config.server_name.clone())
            .map_err(|e| SocketError::SecureHandshake(e.to_string()))?;
        let mut io = DescriptorIo { transport, descriptor };
        while conn.is_handshaking() {
            conn.complete_io(&mut io)
                .map_err(|e| SocketError::SecureHandshake(e.to_string()))?;
        }
        debug!(protocol = ?conn.protocol_version(), "secure channel established");
        Ok(Self { conn, pending: None })
    }

    /// Read decrypted bytes; a peer hanging up without close_notify reads as `0`
    pub(crate) fn read<T: Transport>(
        &mut self,
        transport: &T,
        descriptor: &T::Descriptor,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let mut io = DescriptorIo { transport, descriptor };
        match rustls::Stream::new(&mut self.conn, &mut io).read(buf) {
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("peer closed without close_notify");
                Ok(0)
            }
            read => read,
        }
    }

    /// Encrypt a prefix of `data` and send its records
    ///
    /// The prefix counts as written only once every record is on the wire. A
    /// failed send keeps the records queued; the next call flushes them before
    /// taking new plaintext, so a retry with the same `data` does not encrypt
    /// it twice.
    pub(crate) fn write<T: Transport>(
        &mut self,
        transport: &T,
        descriptor: &T::Descriptor,
        data: &[u8],
    ) -> io::Result<usize> {
        let accepted = match self.pending {
            Some(accepted) => accepted,
            None => {
                let accepted = self.conn.writer().write(data)?;
                self.pending = Some(accepted);
                accepted
            }
        };

        let mut io = DescriptorIo { transport, descriptor };
        while self.conn.wants_write() {
            if self.conn.write_tls(&mut io)? == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "no record bytes sent"));
            }
        }
        self.pending = None;
        Ok(accepted)
    }

    /// Forget plaintext whose records never went out
    ///
    /// The records stay queued in the session and go out ahead of the next
    /// write.
    pub(crate) fn abandon_pending(&mut self) {
        if let Some(accepted) = self.pending.take() {
            debug!(accepted, "secure write abandoned with records queued");
        }
    }

    /// Send close_notify, best effort
    pub(crate) fn close<T: Transport>(mut self, transport: &T, descriptor: &T::Descriptor) {
        self.conn.send_close_notify();
        let mut io = DescriptorIo { transport, descriptor };
        while self.conn.wants_write() {
            if let Err(e) = self.conn.write_tls(&mut io) {
                debug!(error = %e, "close_notify not delivered");
                break;
            }
        }
    }
}
