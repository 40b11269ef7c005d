//! Datagram Packet Module
//!
//! The receipt record filled by a connectionless receive. A packet is created by
//! the caller, handed to the receive call, and owned by the caller afterwards.

use std::borrow::Cow;

/// One received datagram together with the addressing it arrived with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatagramPacket {
    data: Vec<u8>,
    local_address: String,
    local_port: Option<u16>,
    remote_address: String,
    remote_port: u16,
}

impl DatagramPacket {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload interpreted as text (invalid UTF-8 is replaced)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Local interface address the datagram was received on
    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Local port of the receiving socket
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// Numeric address of the sender
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Port of the sender
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn set_data(&mut self, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    pub fn set_local_address(&mut self, addr: impl Into<String>) {
        self.local_address = addr.into();
    }

    pub fn set_local_port(&mut self, port: Option<u16>) {
        self.local_port = port;
    }

    pub fn set_remote_address(&mut self, addr: impl Into<String>) {
        self.remote_address = addr.into();
    }

    pub fn set_remote_port(&mut self, port: u16) {
        self.remote_port = port;
    }
}
