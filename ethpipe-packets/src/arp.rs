use crate::*;
use std::net::Ipv4Addr;

pub const ARP_HTYPE_ETHERNET: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

///
/// ARP packet for Ethernet hardware and IPv4 protocol addresses, the only
/// combination this stack resolves. RFC 826: https://tools.ietf.org/html/rfc826
///
/// 0       2       4    5    6       8          14     18         24     28
/// |-htype-|-ptype-|hlen|plen|--op---|---sha----|-spa--|---tha----|-tpa--|
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub const LEN: usize = 28;

    /// Who-has request; the target hardware address is left zeroed.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    /// Builds the reply to `request`, answering with the given local binding.
    pub fn reply_to(request: &ArpPacket, local_mac: MacAddr, local_ip: Ipv4Addr) -> Self {
        ArpPacket {
            op: ArpOp::Reply,
            sender_mac: local_mac,
            sender_ip: local_ip,
            target_mac: request.sender_mac,
            target_ip: request.sender_ip,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        ensure_len(data, Self::LEN)?;

        if u16::from_be_bytes([data[0], data[1]]) != ARP_HTYPE_ETHERNET {
            return Err(HeaderError::UnsupportedArp("hardware type is not Ethernet"));
        }
        if u16::from_be_bytes([data[2], data[3]]) != IPV4_ETHER_TYPE {
            return Err(HeaderError::UnsupportedArp("protocol type is not IPv4"));
        }
        if data[4] != 6 || data[5] != 4 {
            return Err(HeaderError::UnsupportedArp("unexpected address lengths"));
        }
        let op = match u16::from_be_bytes([data[6], data[7]]) {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            _ => return Err(HeaderError::UnsupportedArp("unknown opcode")),
        };

        Ok(ArpPacket {
            op,
            sender_mac: MacAddr::read(data, 8),
            sender_ip: read_ipv4(data, 14),
            target_mac: MacAddr::read(data, 18),
            target_ip: read_ipv4(data, 24),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[0..2].copy_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
        bytes[2..4].copy_from_slice(&IPV4_ETHER_TYPE.to_be_bytes());
        bytes[4] = 6;
        bytes[5] = 4;
        bytes[6..8].copy_from_slice(&(self.op as u16).to_be_bytes());
        bytes[8..14].copy_from_slice(&self.sender_mac.bytes);
        bytes[14..18].copy_from_slice(&self.sender_ip.octets());
        bytes[18..24].copy_from_slice(&self.target_mac.bytes);
        bytes[24..28].copy_from_slice(&self.target_ip.octets());
        bytes
    }
}
