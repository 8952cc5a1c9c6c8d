//! Multicast socket wrapper for market data publication and reception.
//!
//! Thin layer over socket2 exposing the options a latency benchmark cares
//! about. Receive calls write into caller-provided buffers so the receive loop
//! can use pre-allocated frame storage.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// A UDP multicast socket.
pub struct MulticastSocket {
    socket: Socket,
}

impl MulticastSocket {
    /// Creates a new unbound socket, suitable for publishing.
    ///
    /// Multicast loopback is left enabled so a receiver on the same host
    /// sees the feed.
    pub fn new() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        Ok(Self { socket })
    }

    /// Creates a socket bound to `port` on all interfaces and joined to `group`.
    ///
    /// # Arguments
    /// * `group` - The multicast group address (e.g., 239.1.1.1)
    /// * `port` - The port number to listen on
    /// * `interface` - The local interface IP to join on (0.0.0.0 for any)
    pub fn join_group(group: Ipv4Addr, port: u16, interface: Ipv4Addr) -> io::Result<Self> {
        if !group.is_multicast() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Address is not a valid multicast address",
            ));
        }

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        // Several receivers on one host may share the group and port
        socket.set_reuse_address(true)?;
        #[cfg(target_os = "linux")]
        socket.set_reuse_port(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SocketAddr::V4(bind_addr).into())?;

        socket.join_multicast_v4(&group, &interface)?;

        Ok(Self { socket })
    }

    /// Sends a datagram to `group:port`.
    pub fn send_to(&self, data: &[u8], group: Ipv4Addr, port: u16) -> io::Result<usize> {
        let socket_addr = SocketAddr::V4(SocketAddrV4::new(group, port));
        self.socket.send_to(data, &socket_addr.into())
    }

    /// Receives one datagram into `buf`, blocking according to the socket's
    /// blocking mode and read timeout.
    ///
    /// Datagrams longer than `buf` are truncated.
    #[inline]
    pub fn recv_into(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.socket).read(buf)
    }

    /// Bounds how long a blocking receive waits before failing with
    /// `WouldBlock`/`TimedOut`. `None` waits indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    /// Sets the kernel receive buffer size (SO_RCVBUF).
    pub fn set_recv_buffer_size(&self, bytes: usize) -> io::Result<()> {
        self.socket.set_recv_buffer_size(bytes)
    }

    /// Sets the multicast TTL (1 = local network only).
    pub fn set_multicast_ttl(&self, ttl: u32) -> io::Result<()> {
        self.socket.set_multicast_ttl_v4(ttl)
    }

    /// Enables or disables receiving our own multicast packets.
    pub fn set_multicast_loop(&self, enabled: bool) -> io::Result<()> {
        self.socket.set_multicast_loop_v4(enabled)
    }

    /// Sets the outgoing interface for multicast packets.
    pub fn set_multicast_interface(&self, interface: Ipv4Addr) -> io::Result<()> {
        self.socket.set_multicast_if_v4(&interface)
    }

    /// Leaves a multicast group.
    pub fn leave_group(&self, group: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()> {
        self.socket.leave_multicast_v4(&group, &interface)
    }
}
