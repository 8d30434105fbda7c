//! Connected UDP sockets for network-addressed nodes.
//!
//! A datagram is either sent whole or the send fails; there is no partial
//! continuation as with stream transports.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::debug;

use crate::error::{DriverError, Result};

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// Binds an ephemeral local port and connects it to `host:port`.
    /// Broadcast is enabled so a broadcast address may be used as the peer.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let id = format!("{}:{}", host, port);
        let open_error = |source: io::Error| DriverError::TransportOpen {
            id: id.clone(),
            source,
        };

        let peer = (host, port)
            .to_socket_addrs()
            .map_err(open_error)?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| DriverError::DeviceNotFound(id.clone()))?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(open_error)?;
        socket
            .set_broadcast(true)
            .and_then(|_| socket.set_write_timeout(Some(WRITE_TIMEOUT)))
            .map_err(|e| DriverError::config(&id, e.to_string()))?;
        socket.connect(peer).map_err(open_error)?;

        debug!("UDP link to {} open", peer);
        Ok(UdpLink { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        let sent = self
            .socket
            .send(datagram)
            .map_err(DriverError::TransportWrite)?;
        if sent != datagram.len() {
            return Err(DriverError::TransportWrite(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: {} of {} bytes", sent, datagram.len()),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_reaches_peer() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let link = UdpLink::connect("127.0.0.1", port).unwrap();
        assert_eq!(link.peer().port(), port);
        link.send_datagram(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_unresolvable_host() {
        let result = UdpLink::connect("host.invalid", 6454);
        assert!(result.is_err());
    }
}
