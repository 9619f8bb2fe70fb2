//! ICMPv4 echo messages.

use crate::priv_prelude::*;

const ECHO_REPLY: u8 = 0;
const ECHO_REQUEST: u8 = 8;
const PROTOCOL_ICMP: u8 = 1;
const ICMP_HEADER_LEN: usize = 8;
const MIN_IPV4_HEADER_LEN: usize = 20;

/// The internet checksum of RFC 1071: the ones' complement of the ones' complement sum of the
/// data taken as big-endian 16 bit words. An odd trailing byte is padded with zero.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Encodes an ICMP echo request message (without an IP header).
pub fn echo_request(id: u16, seq: u16, payload: &[u8]) -> Bytes {
    let mut message = BytesMut::with_capacity(ICMP_HEADER_LEN + payload.len());
    message.put_u8(ECHO_REQUEST);
    message.put_u8(0);
    message.put_u16(0);
    message.put_u16(id);
    message.put_u16(seq);
    message.put_slice(payload);
    let checksum = checksum(&message);
    message[2..4].copy_from_slice(&checksum.to_be_bytes());
    message.freeze()
}

/// An ICMP echo reply received on a raw socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoReply {
    pub source: Ipv4Addr,
    pub id: u16,
    pub seq: u16,
    pub payload: Bytes,
}

impl EchoReply {
    /// Decodes an echo reply out of an IPv4 packet, as read from a raw `IPPROTO_ICMP` socket.
    /// Returns `None` for anything else, including replies with a bad checksum.
    pub fn parse(packet: &[u8]) -> Option<EchoReply> {
        if packet.len() < MIN_IPV4_HEADER_LEN || packet[0] >> 4 != 4 {
            return None;
        }
        let header_len = usize::from(packet[0] & 0x0f) * 4;
        if header_len < MIN_IPV4_HEADER_LEN || packet.len() < header_len + ICMP_HEADER_LEN {
            return None;
        }
        if packet[9] != PROTOCOL_ICMP {
            return None;
        }
        let source = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
        let message = &packet[header_len..];
        if message[0] != ECHO_REPLY || message[1] != 0 {
            return None;
        }
        if checksum(message) != 0 {
            return None;
        }
        Some(EchoReply {
            source,
            id: u16::from_be_bytes([message[4], message[5]]),
            seq: u16::from_be_bytes([message[6], message[7]]),
            payload: Bytes::copy_from_slice(&message[ICMP_HEADER_LEN..]),
        })
    }
}
