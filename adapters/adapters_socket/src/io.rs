//! Socket I/O Module
//!
//! Blocking byte-stream and datagram transfer on a [`SocketHandle`]. Stream
//! traffic of a secure socket goes through its TLS session.

use std::io;
use std::net::SocketAddr;
use std::thread;

use entities_network::{AddressFamily, DatagramPacket};
use tracing::{debug, trace};

use crate::connection::checked_port;
use crate::error::SocketError;
use crate::resolver::{resolve, ResolveMode};
use crate::socket::SocketHandle;
use crate::transport::{SocketOption, Transport};

const LINE_FEED: u8 = b'\n';

impl<T: Transport> SocketHandle<T> {
    /// Read whatever is available, blocking until something arrives
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Bytes read; `0` means the peer closed the connection. On a
    ///   secure socket this includes a peer that hangs up without close_notify
    /// * `Err(SocketError)` - Read failed, or the handle is unbound
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        let descriptor = self.descriptor.as_ref().ok_or(SocketError::NotBound)?;
        let read = match self.secure_session.as_mut() {
            Some(session) => session.read(&self.transport, descriptor, buf),
            None => self.transport.recv(descriptor, buf),
        };
        match read {
            Ok(n) => {
                trace!(n, "socket read");
                Ok(n)
            }
            Err(e) => {
                debug!(error = %e, "socket read failed");
                Err(e.into())
            }
        }
    }

    /// Write all of `data`, retrying transient send failures
    ///
    /// A send that fails or makes no progress is retried after
    /// `send_retry_wait`, at most `send_retry_count` times in a row. Any
    /// successful send resets the count. On a secure socket a chunk counts as
    /// sent once all of its TLS records are on the wire.
    ///
    /// # Returns
    ///
    /// `data.len()` once everything is sent, or `0` when the retries run out,
    /// the handle is unbound or `data` is empty. Bytes already sent before the
    /// retries ran out are not reported.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if data.is_empty() || self.descriptor.is_none() {
            return 0;
        }

        let mut sent = 0;
        let mut retries = 0;
        while sent < data.len() {
            match self.send_some(&data[sent..]) {
                Ok(n) if n > 0 => {
                    sent += n;
                    retries = 0;
                }
                outcome => {
                    retries += 1;
                    if retries > self.config.send_retry_count {
                        debug!(sent, total = data.len(), "write abandoned after retries");
                        if let Some(session) = self.secure_session.as_mut() {
                            session.abandon_pending();
                        }
                        return 0;
                    }
                    if let Err(e) = outcome {
                        trace!(retries, error = %e, "send failed, retrying");
                    }
                    thread::sleep(self.config.send_retry_wait);
                }
            }
        }
        trace!(n = sent, "socket write");
        sent
    }

    fn send_some(&mut self, data: &[u8]) -> io::Result<usize> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is not bound"))?;
        match self.secure_session.as_mut() {
            Some(session) => session.write(&self.transport, descriptor, data),
            None => self.transport.send(descriptor, data),
        }
    }

    /// Read one line, up to and including its line feed
    ///
    /// At most `buf.len() - 1` bytes are stored, followed by a NUL. The rest
    /// of an overlong line is read and discarded, so the next read starts on
    /// the following line.
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Bytes stored, excluding the NUL
    /// * `Err(SocketError)` - Not a single byte could be read, or `buf` is empty
    pub fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, SocketError> {
        if buf.is_empty() {
            return Err(SocketError::InvalidArgument("empty line buffer".to_string()));
        }
        let capacity = buf.len() - 1;
        let mut stored = 0;
        let mut consumed = 0usize;
        let mut byte = [0u8; 1];

        loop {
            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    consumed += 1;
                    if stored < capacity {
                        buf[stored] = byte[0];
                        stored += 1;
                    }
                    if byte[0] == LINE_FEED {
                        break;
                    }
                }
                Err(e) if consumed == 0 => {
                    buf[0] = 0;
                    return Err(e);
                }
                Err(_) => break,
            }
        }

        buf[stored] = 0;
        if consumed == 0 {
            return Err(SocketError::Io("end of stream".to_string()));
        }
        Ok(stored)
    }

    /// Read and discard up to `n` bytes; returns how many were skipped
    pub fn skip(&mut self, n: usize) -> usize {
        let mut byte = [0u8; 1];
        let mut skipped = 0;
        while skipped < n {
            match self.read(&mut byte) {
                Ok(1) => skipped += 1,
                _ => break,
            }
        }
        skipped
    }

    /// Send one datagram to `address`:`port`
    ///
    /// An unbound handle sends from a descriptor opened for this call only.
    /// The configured multicast TTL is applied before every send.
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Bytes sent; `0` for empty `data`
    /// * `Err(SocketError)` - Resolution, allocation or send failure
    pub fn send_to(&mut self, address: &str, port: i32, data: &[u8]) -> Result<usize, SocketError> {
        if data.is_empty() {
            return Ok(0);
        }
        let port = checked_port(port)?;
        let peer = resolve(address, port, ResolveMode::Peer, self.interfaces.as_ref())?;

        let ephemeral = if self.descriptor.is_none() {
            Some(self.open_descriptor(AddressFamily::of(&peer.ip()))?)
        } else {
            None
        };
        let descriptor = ephemeral
            .as_ref()
            .or(self.descriptor.as_ref())
            .ok_or(SocketError::NotBound)?;

        let ttl = self.config.multicast_ttl;
        if let Err(e) = self.transport.set_option(descriptor, SocketOption::MulticastTtl(ttl)) {
            debug!(ttl, error = %e, "multicast TTL not applied");
        }
        let sent = self.transport.send_to(descriptor, data, &peer);

        if let Some(descriptor) = ephemeral {
            self.discard(descriptor);
        }

        match sent {
            Ok(n) => {
                trace!(n, %peer, "datagram sent");
                Ok(n)
            }
            Err(e) => {
                debug!(%peer, error = %e, "datagram send failed");
                Err(SocketError::Io(e.to_string()))
            }
        }
    }

    /// Receive one datagram into `packet`
    ///
    /// Datagrams longer than `datagram_buffer_size` are truncated. A
    /// zero-length datagram leaves `packet` untouched.
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Payload length
    /// * `Err(SocketError)` - Receive failed, or the handle is unbound
    pub fn receive(&mut self, packet: &mut DatagramPacket) -> Result<usize, SocketError> {
        let descriptor = self.bound_descriptor()?;
        let mut buf = vec![0u8; self.config.datagram_buffer_size];
        let (n, from) = self.transport.recv_from(descriptor, &mut buf).map_err(|e| {
            debug!(error = %e, "datagram receive failed");
            SocketError::Io(e.to_string())
        })?;
        if n == 0 {
            return Ok(0);
        }

        packet.set_data(&buf[..n]);
        packet.set_local_port(self.local_port);
        packet.set_local_address(self.receiving_address(descriptor, &from));
        packet.set_remote_address(from.ip().to_string());
        packet.set_remote_port(from.port());
        trace!(n, %from, "datagram received");
        Ok(n)
    }

    /// Local address a datagram from `from` arrived on.
    ///
    /// A socket bound to one address reports that address. A wildcard-bound
    /// socket reports the first local interface of the sender's family that
    /// matches the sender's loopback-ness, else the first of that family.
    fn receiving_address(&self, descriptor: &T::Descriptor, from: &SocketAddr) -> String {
        if let Ok(local) = self.transport.local_addr(descriptor) {
            if !local.ip().is_unspecified() {
                return local.ip().to_string();
            }
        }

        let family = AddressFamily::of(&from.ip());
        let candidates: Vec<_> = self
            .interfaces
            .interfaces()
            .into_iter()
            .filter(|iface| iface.family() == family)
            .collect();
        candidates
            .iter()
            .find(|iface| iface.is_loopback() == from.ip().is_loopback())
            .or_else(|| candidates.first())
            .map(|iface| iface.address.to_string())
            .unwrap_or_else(|| self.local_address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SocketConfig;
    use crate::transport::MockTransport;
    use adapters_net_interfaces::FixedInterfaces;
    use entities_network::{NetworkInterface, SocketType};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn config() -> SocketConfig {
        SocketConfig {
            send_retry_count: 10,
            send_retry_wait: Duration::from_millis(20),
            multicast_ttl: 4,
            datagram_buffer_size: 512,
        }
    }

    fn bound(kind: SocketType, mut transport: MockTransport) -> SocketHandle<MockTransport> {
        transport.expect_close().returning(|_| Ok(()));
        let mut socket = SocketHandle::with_transport(kind, transport)
            .with_config(config())
            .with_interfaces(Arc::new(FixedInterfaces(vec![
                NetworkInterface::new("eth0", "192.168.1.10".parse().unwrap(), 0),
                NetworkInterface::new("lo", "127.0.0.1".parse().unwrap(), 0),
            ])));
        socket.descriptor = Some(1);
        socket.local_address = "0.0.0.0".to_string();
        socket.local_port = Some(3610);
        socket
    }

    /// Transport whose stream side replays `bytes`, then reports end of stream
    fn scripted(bytes: &[u8]) -> (MockTransport, Arc<Mutex<VecDeque<u8>>>) {
        let stream = Arc::new(Mutex::new(bytes.iter().copied().collect::<VecDeque<u8>>()));
        let source = Arc::clone(&stream);
        let mut transport = MockTransport::new();
        transport.expect_recv().returning(move |_, buf: &mut [u8]| {
            let mut source = source.lock().unwrap();
            let mut n = 0;
            while n < buf.len() {
                match source.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        });
        (transport, stream)
    }

    #[test]
    fn test_write_gives_up_after_retries() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(11)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::WouldBlock, "busy")));
        let mut socket = bound(SocketType::Stream, transport);

        let start = Instant::now();
        assert_eq!(socket.write(b"HELLO"), 0);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_write_discards_partial_progress() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_send().returning(move |_, data| {
            calls += 1;
            if calls == 1 {
                Ok(data.len().min(2))
            } else {
                Ok(0)
            }
        });
        let mut socket = bound(SocketType::Stream, transport).with_config(SocketConfig {
            send_retry_wait: Duration::from_millis(1),
            ..config()
        });
        assert_eq!(socket.write(b"HELLO"), 0);
    }

    #[test]
    fn test_write_delivers_all_bytes_in_pieces() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let mut transport = MockTransport::new();
        transport.expect_send().returning(move |_, data| {
            let n = data.len().min(3);
            sink.lock().unwrap().extend_from_slice(&data[..n]);
            Ok(n)
        });
        let mut socket = bound(SocketType::Stream, transport);

        let payload: Vec<u8> = (0..100u8).collect();
        assert_eq!(socket.write(&payload), 100);
        assert_eq!(*received.lock().unwrap(), payload);
    }

    #[test]
    fn test_write_recovers_from_transient_failures() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_send().returning(move |_, data| {
            calls += 1;
            if calls % 3 == 0 {
                Ok(data.len().min(4))
            } else {
                Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"))
            }
        });
        let mut socket = bound(SocketType::Stream, transport).with_config(SocketConfig {
            send_retry_wait: Duration::from_millis(1),
            ..config()
        });
        assert_eq!(socket.write(b"0123456789"), 10);
    }

    #[test]
    fn test_write_empty_or_unbound() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let mut socket = bound(SocketType::Stream, transport);
        assert_eq!(socket.write(b""), 0);

        let mut unbound = SocketHandle::with_transport(SocketType::Stream, MockTransport::new());
        assert_eq!(unbound.write(b"data"), 0);
    }

    #[test]
    fn test_read_unbound_and_eof() {
        let mut unbound = SocketHandle::with_transport(SocketType::Stream, MockTransport::new());
        let mut buf = [0u8; 8];
        assert_eq!(unbound.read(&mut buf), Err(SocketError::NotBound));

        let (transport, _) = scripted(b"");
        let mut socket = bound(SocketType::Stream, transport);
        assert_eq!(socket.read(&mut buf), Ok(0));
    }

    #[test]
    fn test_read_line_basic() {
        let (transport, rest) = scripted(b"HTTP/1.1 200 OK\r\nHost: x\r\n");
        let mut socket = bound(SocketType::Stream, transport);
        let mut buf = [0xffu8; 64];

        let n = socket.read_line(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"HTTP/1.1 200 OK\r\n");
        assert_eq!(buf[n], 0);
        assert_eq!(rest.lock().unwrap().len(), b"Host: x\r\n".len());
    }

    #[test]
    fn test_read_line_truncates_and_skips_rest_of_line() {
        let (transport, rest) = scripted(b"abcdefgh\nnext");
        let mut socket = bound(SocketType::Stream, transport);
        let mut buf = [0u8; 4];

        assert_eq!(socket.read_line(&mut buf), Ok(3));
        assert_eq!(&buf, b"abc\0");
        assert_eq!(rest.lock().unwrap().iter().copied().collect::<Vec<_>>(), b"next");
    }

    #[test]
    fn test_read_line_partial_at_end_of_stream() {
        let (transport, _) = scripted(b"tail");
        let mut socket = bound(SocketType::Stream, transport);
        let mut buf = [0u8; 16];
        assert_eq!(socket.read_line(&mut buf), Ok(4));
        assert_eq!(&buf[..5], b"tail\0");
    }

    #[test]
    fn test_read_line_nothing_to_read() {
        let (transport, _) = scripted(b"");
        let mut socket = bound(SocketType::Stream, transport);
        let mut buf = [0u8; 16];
        assert!(socket.read_line(&mut buf).is_err());
        assert_eq!(buf[0], 0);

        let mut empty: [u8; 0] = [];
        assert!(matches!(socket.read_line(&mut empty), Err(SocketError::InvalidArgument(_))));
    }

    #[test]
    fn test_skip() {
        let (transport, rest) = scripted(b"0123456789");
        let mut socket = bound(SocketType::Stream, transport);
        assert_eq!(socket.skip(4), 4);
        assert_eq!(rest.lock().unwrap().len(), 6);
        assert_eq!(socket.skip(100), 6);
        assert_eq!(socket.skip(1), 0);
    }

    #[test]
    fn test_send_to_unbound_uses_ephemeral_descriptor() {
        let mut transport = MockTransport::new();
        transport.expect_open().times(1).returning(|_, _| Ok(42));
        transport
            .expect_set_option()
            .withf(|d, o| *d == 42 && *o == SocketOption::MulticastTtl(4))
            .times(1)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "ignored")));
        transport
            .expect_send_to()
            .withf(|d, data, addr| *d == 42 && data.to_vec() == b"PING".to_vec() && *addr == "127.0.0.1:9999".parse().unwrap())
            .times(1)
            .returning(|_, data, _| Ok(data.len()));
        transport.expect_close().withf(|d| *d == 42).times(1).returning(|_| Ok(()));

        let mut socket = SocketHandle::with_transport(SocketType::Datagram, transport).with_config(config());
        assert_eq!(socket.send_to("127.0.0.1", 9999, b"PING"), Ok(4));
        assert!(!socket.is_bound());
    }

    #[test]
    fn test_send_to_failures() {
        let mut transport = MockTransport::new();
        transport.expect_set_option().returning(|_, _| Ok(()));
        transport
            .expect_send_to()
            .returning(|_, _, _| Err(io::Error::new(io::ErrorKind::Other, "unreachable")));
        let mut socket = bound(SocketType::Datagram, transport);

        assert_eq!(socket.send_to("127.0.0.1", 9999, b""), Ok(0));
        assert!(matches!(socket.send_to("", 9999, b"x"), Err(SocketError::Resolution(_))));
        assert!(matches!(socket.send_to("127.0.0.1", 9999, b"x"), Err(SocketError::Io(_))));
        assert!(socket.is_bound());
    }

    #[test]
    fn test_receive_fills_packet() {
        let mut transport = MockTransport::new();
        transport.expect_recv_from().returning(|_, buf: &mut [u8]| {
            buf[..4].copy_from_slice(b"PING");
            Ok((4, "127.0.0.1:50123".parse().unwrap()))
        });
        transport
            .expect_local_addr()
            .returning(|_| Ok("0.0.0.0:3610".parse().unwrap()));
        let mut socket = bound(SocketType::Datagram, transport);

        let mut packet = DatagramPacket::new();
        assert_eq!(socket.receive(&mut packet), Ok(4));
        assert_eq!(packet.data(), b"PING");
        assert_eq!(packet.local_port(), Some(3610));
        assert_eq!(packet.remote_address(), "127.0.0.1");
        assert_eq!(packet.remote_port(), 50123);
        // wildcard bind: loopback sender maps to the loopback interface
        assert_eq!(packet.local_address(), "127.0.0.1");
    }

    #[test]
    fn test_receive_picks_non_loopback_for_remote_sender() {
        let mut transport = MockTransport::new();
        transport
            .expect_recv_from()
            .returning(|_, _| Ok((1, "192.168.1.77:3610".parse().unwrap())));
        transport
            .expect_local_addr()
            .returning(|_| Ok("0.0.0.0:3610".parse().unwrap()));
        let mut socket = bound(SocketType::Datagram, transport);

        let mut packet = DatagramPacket::new();
        socket.receive(&mut packet).unwrap();
        assert_eq!(packet.local_address(), "192.168.1.10");
    }

    #[test]
    fn test_receive_reports_concrete_bind_address() {
        let mut transport = MockTransport::new();
        transport
            .expect_recv_from()
            .returning(|_, _| Ok((1, "10.0.0.5:3610".parse().unwrap())));
        transport
            .expect_local_addr()
            .returning(|_| Ok("10.0.0.1:3610".parse().unwrap()));
        let mut socket = bound(SocketType::Datagram, transport);

        let mut packet = DatagramPacket::new();
        socket.receive(&mut packet).unwrap();
        assert_eq!(packet.local_address(), "10.0.0.1");
    }

    #[test]
    fn test_receive_empty_datagram_leaves_packet() {
        let mut transport = MockTransport::new();
        transport
            .expect_recv_from()
            .returning(|_, _| Ok((0, "127.0.0.1:1".parse().unwrap())));
        let mut socket = bound(SocketType::Datagram, transport);

        let mut packet = DatagramPacket::new();
        packet.set_data(b"old");
        assert_eq!(socket.receive(&mut packet), Ok(0));
        assert_eq!(packet.data(), b"old");
        assert_eq!(packet.remote_port(), 0);
    }

    #[test]
    fn test_receive_uses_configured_buffer_size() {
        let mut transport = MockTransport::new();
        transport
            .expect_recv_from()
            .withf(|_, buf| buf.len() == 16)
            .returning(|_, buf: &mut [u8]| {
                let n = buf.len();
                buf.fill(b'x');
                Ok((n, "127.0.0.1:1".parse().unwrap()))
            });
        transport
            .expect_local_addr()
            .returning(|_| Ok("127.0.0.1:3610".parse().unwrap()));
        let mut socket = bound(SocketType::Datagram, transport).with_config(SocketConfig {
            datagram_buffer_size: 16,
            ..config()
        });

        let mut packet = DatagramPacket::new();
        assert_eq!(socket.receive(&mut packet), Ok(16));
    }

    #[test]
    fn test_receive_errors() {
        let mut unbound = SocketHandle::with_transport(SocketType::Datagram, MockTransport::new());
        let mut packet = DatagramPacket::new();
        assert_eq!(unbound.receive(&mut packet), Err(SocketError::NotBound));

        let mut transport = MockTransport::new();
        transport
            .expect_recv_from()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")));
        let mut socket = bound(SocketType::Datagram, transport);
        assert!(matches!(socket.receive(&mut packet), Err(SocketError::Io(_))));
    }

    proptest! {
        #[test]
        fn prop_read_line_respects_buffer(
            line in proptest::collection::vec(any::<u8>().prop_filter("no line feed", |b| *b != b'\n'), 0..64),
            tail in proptest::collection::vec(any::<u8>(), 0..16),
            len in 1usize..48,
        ) {
            let mut stream = line.clone();
            stream.push(b'\n');
            stream.extend_from_slice(&tail);
            let (transport, rest) = scripted(&stream);
            let mut socket = bound(SocketType::Stream, transport);

            let mut buf = vec![0xaau8; len];
            let n = socket.read_line(&mut buf).unwrap();

            prop_assert!(n <= len - 1);
            prop_assert_eq!(buf[n], 0);
            let mut expected = line.clone();
            expected.push(b'\n');
            prop_assert_eq!(&buf[..n], &expected[..n]);
            prop_assert_eq!(rest.lock().unwrap().iter().copied().collect::<Vec<_>>(), tail);
        }
    }
}
