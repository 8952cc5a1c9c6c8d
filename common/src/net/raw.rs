//! Link-layer capture socket (Linux `AF_PACKET`).
//!
//! Delivers whole Ethernet frames straight from the device queue, skipping
//! the IP and UDP stacks. Used by the poll-mode receive path, which does its
//! own header decoding.

use socket2::{Domain, Protocol, Socket, Type};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};

// <linux/if_packet.h>
const PACKET_ADD_MEMBERSHIP: libc::c_int = 1;
const PACKET_FANOUT: libc::c_int = 18;
const PACKET_FANOUT_HASH: libc::c_int = 0;
const PACKET_MR_PROMISC: libc::c_ushort = 1;
const PACKET_OUTGOING: libc::c_uchar = 4;

/// `struct packet_mreq`
#[repr(C)]
struct PacketMreq {
    mr_ifindex: libc::c_int,
    mr_type: libc::c_ushort,
    mr_alen: libc::c_ushort,
    mr_address: [libc::c_uchar; 8],
}

/// A raw packet socket bound to one network interface.
pub struct RawSocket {
    socket: Socket,
    ifindex: libc::c_int,
}

impl RawSocket {
    /// Opens a capture socket for every EtherType on `interface`.
    ///
    /// Requires CAP_NET_RAW.
    pub fn open(interface: &str) -> io::Result<Self> {
        let ifindex = interface_index(interface)?;
        let protocol = (libc::ETH_P_ALL as u16).to_be();

        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(libc::c_int::from(protocol))),
        )?;

        // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = ifindex;

        // SAFETY: addr is a fully initialized sockaddr_ll and the length matches
        let rc = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { socket, ifindex })
    }

    /// Joins fanout group `group_id` in hash mode. Every socket in the group
    /// receives a disjoint share of the interface's traffic, split by flow.
    pub fn join_fanout(&self, group_id: u16) -> io::Result<()> {
        let value: libc::c_int = libc::c_int::from(group_id) | (PACKET_FANOUT_HASH << 16);
        setsockopt(self.socket.as_raw_fd(), libc::SOL_PACKET, PACKET_FANOUT, &value)
    }

    /// Puts the interface in promiscuous mode for the socket's lifetime.
    pub fn set_promiscuous(&self) -> io::Result<()> {
        let mreq = PacketMreq {
            mr_ifindex: self.ifindex,
            mr_type: PACKET_MR_PROMISC,
            mr_alen: 0,
            mr_address: [0; 8],
        };
        setsockopt(self.socket.as_raw_fd(), libc::SOL_PACKET, PACKET_ADD_MEMBERSHIP, &mreq)
    }

    /// Sets the socket to non-blocking or blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }

    /// Sets the kernel receive buffer size (SO_RCVBUF).
    pub fn set_recv_buffer_size(&self, bytes: usize) -> io::Result<()> {
        self.socket.set_recv_buffer_size(bytes)
    }

    /// Receives one frame into `buf`.
    ///
    /// Returns `Ok(None)` for frames this host transmitted; those would
    /// otherwise be seen twice on loopback.
    #[inline]
    pub fn recv_into(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        // SAFETY: sockaddr_ll is plain old data
        let mut from: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut from_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;

        // SAFETY: buf and from are valid for writes of the lengths passed
        let n = unsafe {
            libc::recvfrom(
                self.socket.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut from as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                &mut from_len,
            )
        };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if from.sll_pkttype == PACKET_OUTGOING {
            return Ok(None);
        }
        Ok(Some(n as usize))
    }

    /// Kernel index of the bound interface.
    pub fn ifindex(&self) -> u32 {
        self.ifindex as u32
    }
}

fn interface_index(interface: &str) -> io::Result<libc::c_int> {
    let name = CString::new(interface)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid interface name"))?;

    // SAFETY: name is a valid NUL-terminated string
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("No such interface: {}", interface),
        ));
    }
    Ok(index as libc::c_int)
}

fn setsockopt<T>(fd: RawFd, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
    // SAFETY: value points to a live T and the length passed is its size
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
