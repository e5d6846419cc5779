use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    sync::atomic::{AtomicU16, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::debug;
use pnet::packet::{
    icmp::{
        echo_reply::EchoReplyPacket, echo_request::MutableEchoRequestPacket, IcmpPacket,
        IcmpTypes,
    },
    ipv4::Ipv4Packet,
    Packet,
};
use socket2::{Domain, Protocol, Socket, Type};

use crate::{
    constants::{ICMP_ECHO_LEN, ICMP_PAYLOAD, MAX_REPLY_LEN},
    error::{Error, Result},
    probe::{Prober, Reachability},
};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum SocketKind {
    /// Unprivileged ping socket; the kernel owns the identifier and strips
    /// the IP header from replies.
    Datagram,
    /// Raw socket; sees every ICMP packet the host receives, IP header included.
    Raw,
}

impl SocketKind {
    fn open(self) -> io::Result<Socket> {
        let ty = match self {
            SocketKind::Datagram => Type::DGRAM,
            SocketKind::Raw => Type::RAW,
        };
        Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))
    }
}

/// Sends one ICMP echo request per probe and waits for the matching reply.
#[derive(Debug)]
pub struct IcmpProber {
    kind: SocketKind,
    identifier: u16,
    sequence: AtomicU16,
}

impl IcmpProber {
    /// Picks the first ICMP socket kind this process may open, preferring the
    /// unprivileged one.
    ///
    /// # Errors
    /// Returns [`Error::Unavailable`] if neither a datagram nor a raw ICMP
    /// socket can be created, typically for lack of privilege.
    pub fn new() -> Result<Self> {
        let kind = match SocketKind::Datagram.open() {
            Ok(_) => SocketKind::Datagram,
            Err(dgram_err) => match SocketKind::Raw.open() {
                Ok(_) => SocketKind::Raw,
                Err(raw_err) => {
                    return Err(Error::Unavailable(format!(
                        "cannot open an ICMP socket (datagram: {}, raw: {}); \
                         run with privileges or allow unprivileged ping via net.ipv4.ping_group_range",
                        dgram_err, raw_err
                    )))
                }
            },
        };
        debug!("using {:?} ICMP sockets", kind);
        Ok(Self {
            kind,
            identifier: std::process::id() as u16,
            sequence: AtomicU16::new(0),
        })
    }

    fn next_sequence(&self) -> u16 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Result<Reachability> {
        let echo = Echo {
            kind: self.kind,
            target,
            identifier: self.identifier,
            sequence: self.next_sequence(),
        };
        tokio::task::spawn_blocking(move || echo.exchange(timeout))
            .await
            .map_err(|err| Error::Opaque(format!("ICMP worker failed: {}", err).into()))?
    }
}

/// One echo request/reply exchange, run on a blocking thread.
#[derive(Copy, Clone, Debug)]
struct Echo {
    kind: SocketKind,
    target: Ipv4Addr,
    identifier: u16,
    sequence: u16,
}

impl Echo {
    fn exchange(self, timeout: Duration) -> Result<Reachability> {
        let deadline = Instant::now() + timeout;
        // std's UdpSocket only issues sendto/recvfrom, which work the same on
        // ICMP sockets and spare us uninitialised buffers
        let socket: UdpSocket = self.kind.open()?.into();
        let request = self.request_packet()?;
        socket.send_to(&request, SocketAddrV4::new(self.target, 0))?;

        let mut buf = [0u8; MAX_REPLY_LEN];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Reachability::Unreachable);
            }
            socket.set_read_timeout(Some(remaining))?;
            let (len, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(Reachability::Unreachable)
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if !is_from(from, self.target) {
                continue;
            }
            if self.is_reply(&buf[..len]) {
                debug!("echo reply from {} (seq {})", self.target, self.sequence);
                return Ok(Reachability::Reachable);
            }
        }
    }

    fn request_packet(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; ICMP_ECHO_LEN + ICMP_PAYLOAD.len()];
        let mut echo = MutableEchoRequestPacket::new(&mut buf)
            .ok_or(Error::Opaque("failed to create echo request packet".into()))?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_identifier(self.identifier);
        echo.set_sequence_number(self.sequence);
        echo.set_payload(ICMP_PAYLOAD);
        let checksum = IcmpPacket::new(echo.packet())
            .map(|icmp| pnet::packet::icmp::checksum(&icmp))
            .ok_or(Error::Opaque("failed to checksum echo request".into()))?;
        echo.set_checksum(checksum);
        Ok(buf)
    }

    fn is_reply(&self, bytes: &[u8]) -> bool {
        let icmp_bytes = match self.kind {
            SocketKind::Datagram => bytes,
            SocketKind::Raw => match Ipv4Packet::new(bytes) {
                Some(ip) => {
                    let header_len = usize::from(ip.get_header_length()) * 4;
                    match bytes.get(header_len..) {
                        Some(rest) => rest,
                        None => return false,
                    }
                }
                None => return false,
            },
        };
        let Some(reply) = EchoReplyPacket::new(icmp_bytes) else {
            return false;
        };
        if reply.get_icmp_type() != IcmpTypes::EchoReply
            || reply.get_sequence_number() != self.sequence
        {
            return false;
        }
        // datagram sockets rewrite the identifier and filter on it for us
        self.kind == SocketKind::Datagram || reply.get_identifier() == self.identifier
    }
}

fn is_from(from: SocketAddr, target: Ipv4Addr) -> bool {
    from.ip() == IpAddr::V4(target)
}
