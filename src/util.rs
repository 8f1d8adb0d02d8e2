//! Internal utilities.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Create and bind the agent's UDP socket.
///
/// IPv6 addresses get `IPV6_V6ONLY = false` so `[::]:161` also serves IPv4.
/// Address reuse is enabled so a restarted agent can rebind immediately.
/// The kernel may cap `recv_buffer_size` at `net.core.rmem_max`.
pub(crate) async fn bind_udp_socket(
    addr: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;

    if let Some(size) = recv_buffer_size {
        // Best effort, the kernel caps it anyway
        let _ = socket.set_recv_buffer_size(size);
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Unspecified address of the same family, for an outbound-only socket.
pub(crate) fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    if target.is_ipv6() {
        SocketAddr::from(([0u16; 8], 0))
    } else {
        SocketAddr::from(([0u8; 4], 0))
    }
}

/// Lower-case hex encoding (engine IDs in logs and file names).
pub(crate) fn to_hex(data: &[u8]) -> String {
    use std::fmt::Write;
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Parse hex, accepting an optional `0x` prefix and `:` separators.
pub fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let digits: String = input
        .strip_prefix("0x")
        .unwrap_or(input)
        .chars()
        .filter(|c| *c != ':')
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// Serialize `Bytes` as a (lossy) UTF-8 string so state files stay readable.
pub(crate) mod serde_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        String::deserialize(deserializer).map(Bytes::from)
    }
}
