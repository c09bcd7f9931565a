use crate::*;

/// Ethernet II header record.
///
/// 0                    6                    12                      14
/// |---6 byte Dest_MAC--|---6 byte Src_MAC---|--2 Byte EtherType---|
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ether_type: u16,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    pub fn new(dest_mac: MacAddr, src_mac: MacAddr, ether_type: u16) -> Self {
        EthernetHeader {
            dest_mac,
            src_mac,
            ether_type,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        ensure_len(data, Self::LEN)?;
        Ok(EthernetHeader {
            dest_mac: MacAddr::read(data, 0),
            src_mac: MacAddr::read(data, 6),
            ether_type: u16::from_be_bytes([data[12], data[13]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0; Self::LEN];
        bytes[0..6].copy_from_slice(&self.dest_mac.bytes);
        bytes[6..12].copy_from_slice(&self.src_mac.bytes);
        bytes[12..14].copy_from_slice(&self.ether_type.to_be_bytes());
        bytes
    }
}
